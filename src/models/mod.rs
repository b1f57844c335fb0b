pub mod analysis;

pub use analysis::{
    AnalysisMeta, AnalysisRecord, AnalysisType, BilingualText, ConceptMapping, GroundingSource,
    Pragmatics, SemanticCore, UsageExample,
};

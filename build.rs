fn main() {
    // The headless library needs no build step; only the Tauri shell does.
    #[cfg(feature = "desktop")]
    {
        tauri_build::build();
    }
}

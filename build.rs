fn main() {
    // Der Tauri-Kontext wird nur für die Desktop-Shell generiert
    #[cfg(feature = "desktop")]
    tauri_build::build();
}

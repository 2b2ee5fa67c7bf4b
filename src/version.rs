pub const APP_NAME: &str = "TO Console";
pub const VERSION: &str = "equuleus-rc2+dev0";
pub const BUILD_CODENAME: &str = "Experimental";
pub const LAST_OFFICIAL: &str = "none";

/// `"<name> DEVELOPMENT BUILD <version> (Codename: <codename>), Last Official Release: <release>"`
pub fn version_string() -> String {
    format!(
        "{} DEVELOPMENT BUILD {} (Codename: {}), Last Official Release: {}",
        APP_NAME, VERSION, BUILD_CODENAME, LAST_OFFICIAL
    )
}

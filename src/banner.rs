// src/banner.rs

/// Prints the application startup banner to the console.
pub fn print_banner() {
    let banner = r#"
  ___  ___ __ _ _ __  _ __ ___| | __ _ _   _
 / __|/ __/ _` | '_ \| '__/ _ \ |/ _` | | | |
 \__ \ (_| (_| | | | | | |  __/ | (_| | |_| |
 |___/\___\__,_|_| |_|_|  \___|_|\__,_|\__, |
                                        |___/

    VirusTotal Submission Proxy
"#;
    println!("{}", banner);
}

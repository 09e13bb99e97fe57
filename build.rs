use std::env;

const EMBEDDED_KEYS: &[&str] = &[
    "CODE_ASSISTANT_API_URL",
    "CODE_ASSISTANT_SIDEBAR_API_URL",
    "CODE_ASSISTANT_FRESHNESS_MS",
    "CODE_ASSISTANT_MIN_SELECTION_CHARS",
    "CODE_ASSISTANT_HTTP_TIMEOUT_SECS",
];

fn main() {
    // Load .env file during build for environment variables
    if let Err(e) = dotenvy::dotenv() {
        println!("cargo:warning=BUILD.RS: Failed to load .env file: {}. Using system environment variables.", e);
    }
    println!("cargo:rerun-if-changed=.env");

    // Embedded values are the fallback when the variable is missing at runtime
    for key in EMBEDDED_KEYS {
        println!("cargo:rerun-if-env-changed={}", key);
        if let Ok(value) = env::var(key) {
            println!("cargo:rustc-env={}={}", key, value);
        }
    }
}

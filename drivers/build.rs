use kconfig::Config;
use std::path::PathBuf;

fn main() {
    let config_file = std::env::var("CONFIG_FILE").unwrap_or("../kernel_conf.json".to_string());
    println!("cargo:rerun-if-changed={}", config_file);
    println!("cargo:rerun-if-env-changed=CONFIG_FILE");

    let config = Config::from_file_or_default(&config_file)
        .unwrap_or_else(|e| panic!("BUILD: invalid config {}: {}", config_file, e));

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("BUILD: OUT_DIR not set"));
    std::fs::write(out_dir.join("config.rs"), config.to_rust_consts()).expect("BUILD: failed to write config.rs");
}

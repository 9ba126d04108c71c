fn main() {
    println!("cargo:rerun-if-env-changed=PLANTCARE_CONFIG");
    println!("cargo:rerun-if-env-changed=AIO_USERNAME");
    println!("cargo:rerun-if-env-changed=AIO_KEY");
    println!("cargo:rerun-if-env-changed=WIFI_SSID");
    println!("cargo:rerun-if-env-changed=WIFI_PASS");

    // Host test builds have no ESP-IDF toolchain to export.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}

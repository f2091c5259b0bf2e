//! Generates the Kotlin and Swift bindings of `certwallet-core`.

fn main() {
    uniffi::uniffi_bindgen_main();
}

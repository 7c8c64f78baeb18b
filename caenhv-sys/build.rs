//! Build script for caenhv-sys.
//!
//! The CAEN HV Wrapper library is proprietary and not present on most
//! development machines, so linking is gated behind the `caen-sdk` feature:
//!
//! 1. With `caen-sdk`: link against the installed libcaenhvwrapper.
//! 2. Without the feature: panic-stub bindings (see `src/stubs.rs`) let the
//!    workspace compile and run its tests with no vendor library installed.

fn main() {
    println!("cargo:rerun-if-env-changed=CAENHV_LIB_DIR");

    #[cfg(feature = "caen-sdk")]
    {
        println!("cargo:rustc-link-lib=caenhvwrapper");

        // Honour an explicit override first, then common install locations.
        if let Ok(dir) = std::env::var("CAENHV_LIB_DIR") {
            println!("cargo:rustc-link-search=native={}", dir);
            return;
        }

        let lib_paths = ["/usr/local/lib", "/usr/lib", "/usr/lib/x86_64-linux-gnu"];
        for path in lib_paths {
            if std::path::Path::new(path)
                .join("libcaenhvwrapper.so")
                .exists()
            {
                println!("cargo:rustc-link-search=native={}", path);
                break;
            }
        }
    }
}

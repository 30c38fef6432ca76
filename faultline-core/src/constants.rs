use std::sync::LazyLock;

use crate::protocol::{ClientSdkInfo, ClientSdkPackage};

/// The version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub static USER_AGENT: LazyLock<String> = LazyLock::new(|| format!("faultline.rust/{VERSION}"));

pub static SDK_INFO: LazyLock<ClientSdkInfo> = LazyLock::new(|| ClientSdkInfo {
    name: "faultline.rust".into(),
    version: VERSION.into(),
    integrations: vec![],
    packages: vec![ClientSdkPackage {
        name: "cargo:faultline".into(),
        version: VERSION.into(),
    }],
});

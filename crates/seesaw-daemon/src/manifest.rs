//! The version metadata document served at `<update_server>/latest.json`.

use seesaw_error::{Result, SeesawError};
use seesaw_types::SystemVersion;
use url::Url;

/// File name of the metadata document under the server base URL.
pub const MANIFEST_FILE: &str = "latest.json";

/// The parsed `latest.json`. Unknown fields are ignored so the server side
/// can grow without breaking fielded devices.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct UpdateManifest {
    /// The newest released version.
    pub latest_version: SystemVersion,
    /// Where the artifact lives; absolute, or relative to the server base.
    pub download_url: String,
    /// Where the detached signature lives; absolute, or relative to the
    /// server base.
    pub signature_url: String,
}

impl UpdateManifest {
    /// The artifact URL resolved against `base`.
    pub fn artifact_url(&self, base: &Url) -> Result<Url> {
        resolve(base, &self.download_url)
    }

    /// The signature URL resolved against `base`.
    pub fn signature_url(&self, base: &Url) -> Result<Url> {
        resolve(base, &self.signature_url)
    }
}

fn resolve(base: &Url, reference: &str) -> Result<Url> {
    base.join(reference).map_err(|err| {
        SeesawError::manifest(format!("cannot resolve URL {reference:?}: {err}"))
    })
}

//! Conversion profiles and their argument lists.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Geometry every profile resizes to.
pub const THUMBNAIL_GEOMETRY: &str = "100x100";

/// A named, fixed set of transformation steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Resize only.
    Thumbnail,
    /// Auto-orient, antialias and contrast correction before resizing.
    #[default]
    Moderate,
    /// The moderate steps plus auto-level, auto-gamma and despeckle.
    /// Several times more CPU-bound than `Moderate`.
    Intense,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Thumbnail, Profile::Moderate, Profile::Intense];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thumbnail => "thumbnail",
            Self::Moderate => "moderate",
            Self::Intense => "intense",
        }
    }

    /// Operators applied between the input and output paths.
    pub fn operators(&self) -> &'static [&'static str] {
        match self {
            Self::Thumbnail => &["-thumbnail", THUMBNAIL_GEOMETRY],
            Self::Moderate => &[
                "-auto-orient",
                "-antialias",
                "-contrast",
                "-thumbnail",
                THUMBNAIL_GEOMETRY,
            ],
            Self::Intense => &[
                "-auto-level",
                "-auto-orient",
                "-antialias",
                "-auto-gamma",
                "-contrast",
                "-despeckle",
                "-thumbnail",
                THUMBNAIL_GEOMETRY,
            ],
        }
    }

    /// Full argument list for the conversion tool: `<input> <operators...> <output>`.
    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let operators = self.operators();
        let mut args = Vec::with_capacity(operators.len() + 2);
        args.push(input.as_os_str().to_owned());
        args.extend(operators.iter().map(OsString::from));
        args.push(output.as_os_str().to_owned());
        args
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thumbnail" => Ok(Self::Thumbnail),
            "moderate" => Ok(Self::Moderate),
            "intense" => Ok(Self::Intense),
            other => Err(format!(
                "unknown profile {other:?} (expected thumbnail, moderate or intense)"
            )),
        }
    }
}

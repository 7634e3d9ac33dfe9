use std::path::PathBuf;

/// CLI configuration, loaded from `ROLLCALL_*` environment variables.
pub struct Config {
    /// Path to the SeetaFace frontal detector model.
    pub model_path: PathBuf,
    /// Maximum Euclidean distance for a gallery match.
    pub gallery_threshold: f32,
    /// Maximum Euclidean distance for a direct pairwise match.
    pub pair_threshold: f32,
}

impl Config {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            model_path: std::env::var("ROLLCALL_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("models/seeta_fd_frontal_v1.0.bin")),
            gallery_threshold: env_f32(
                "ROLLCALL_GALLERY_THRESHOLD",
                rollcall_core::matcher::GALLERY_THRESHOLD,
            ),
            pair_threshold: env_f32(
                "ROLLCALL_PAIR_THRESHOLD",
                rollcall_core::matcher::PAIR_THRESHOLD,
            ),
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

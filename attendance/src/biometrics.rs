use async_trait::async_trait;

/// Liveness verdict and face embedding attached to a check-in.
///
/// Both are produced outside this crate; their meaning is whatever the
/// backend's face matcher expects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BiometricSample {
    pub liveness_passed: bool,
    pub face_embedding: Vec<f64>,
}

#[async_trait]
pub trait BiometricSource: Send + Sync {
    async fn capture(&self) -> anyhow::Result<BiometricSample>;
}

/// Reports a passed liveness check and an empty embedding. This is what the
/// mobile client sends while face capture is not wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderBiometrics;

#[async_trait]
impl BiometricSource for PlaceholderBiometrics {
    async fn capture(&self) -> anyhow::Result<BiometricSample> {
        Ok(BiometricSample {
            liveness_passed: true,
            face_embedding: Vec::new(),
        })
    }
}

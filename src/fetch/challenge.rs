/// Challenge-solver seam.
///
/// Some directories answer searches with an interstitial challenge. The
/// linker consults a `ChallengeSolver` before retrying such a request; a
/// `None` answer means the record is skipped, never retried.
use tracing::{debug, warn};

pub trait ChallengeSolver {
    /// Obtain a token for `challenge_url`, or `None` when none is available.
    fn solve(&self, challenge_url: &str, site_key: &str) -> Option<String>;
}

impl<S: ChallengeSolver + ?Sized> ChallengeSolver for &S {
    fn solve(&self, challenge_url: &str, site_key: &str) -> Option<String> {
        (**self).solve(challenge_url, site_key)
    }
}

/// Never produces a token; challenged records are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSolver;

impl ChallengeSolver for NoSolver {
    fn solve(&self, challenge_url: &str, _site_key: &str) -> Option<String> {
        debug!("No challenge solver configured for {challenge_url}");
        None
    }
}

/// Reads an operator-supplied token from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvTokenSolver {
    var: String,
}

impl EnvTokenSolver {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl ChallengeSolver for EnvTokenSolver {
    fn solve(&self, challenge_url: &str, _site_key: &str) -> Option<String> {
        match std::env::var(&self.var) {
            Ok(token) if !token.trim().is_empty() => Some(token.trim().to_string()),
            _ => {
                warn!("Challenge at {challenge_url} but ${} is not set", self.var);
                None
            }
        }
    }
}

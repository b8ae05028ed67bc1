//! Challenge and repository identities
//!
//! A challenge is addressed by a short identifier that maps onto its remote
//! repository by a fixed naming template. Images built from it are keyed by
//! `{challenge}-{revision}` where the revision is the first 12 characters of
//! the remote HEAD commit at resolution time.

use crate::error::{OrchestratorError, OrchestratorResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Organization hosting the challenge definitions.
pub const CHALLENGE_ORG_URL: &str = "https://github.com/foxskills-dev";

/// Prefix of every challenge repository name.
pub const CHALLENGE_REPO_PREFIX: &str = "challenge-";

/// Length of a revision tag.
pub const REVISION_TAG_LEN: usize = 12;

const GITHUB_HTTPS_PREFIX: &str = "https://github.com/";

/// Short name of a challenge definition.
///
/// The identifier ends up in a repository URL, an image name and two
/// directory names, so it is restricted to ASCII alphanumerics, `-`, `_`
/// and `.`, and may not start with `.` or `-`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChallengeId(String);

impl ChallengeId {
    pub fn parse(name: &str) -> OrchestratorResult<Self> {
        if name.is_empty() {
            return Err(OrchestratorError::Config(
                "Challenge name must not be empty".to_string(),
            ));
        }
        if name.starts_with('.') || name.starts_with('-') {
            return Err(OrchestratorError::Config(format!(
                "Invalid challenge name '{}': must not start with '.' or '-'",
                name
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(OrchestratorError::Config(format!(
                "Invalid challenge name '{}': contains disallowed characters",
                name
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Remote repository holding this challenge's definition.
    pub fn repository(&self) -> RepositoryAddress {
        RepositoryAddress(format!(
            "{}/{}{}.git",
            CHALLENGE_ORG_URL, CHALLENGE_REPO_PREFIX, self.0
        ))
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address of a remote source-control repository.
///
/// `Display` redacts any credentials embedded in the address; use
/// [`RepositoryAddress::as_str`] to get the value handed to tools.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryAddress(String);

impl RepositoryAddress {
    pub fn parse(address: &str) -> OrchestratorResult<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(OrchestratorError::Config(
                "Repository address must not be empty".to_string(),
            ));
        }
        // Would be read as an option by git.
        if address.starts_with('-') {
            return Err(OrchestratorError::Config(format!(
                "Invalid repository address '{}': must not start with '-'",
                address
            )));
        }
        Ok(Self(address.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Embed an access token into a GitHub HTTPS address.
    ///
    /// Addresses on other hosts, or a missing/empty token, leave the address
    /// unchanged.
    pub fn with_credential(&self, token: Option<&str>) -> Self {
        match token {
            Some(token) if !token.is_empty() => match self.0.strip_prefix(GITHUB_HTTPS_PREFIX) {
                Some(rest) => Self(format!("https://{}@github.com/{}", token, rest)),
                None => self.clone(),
            },
            _ => self.clone(),
        }
    }

    /// Address with any `user[:password]@` section replaced by `***@`.
    pub fn redacted(&self) -> String {
        let Some(scheme_end) = self.0.find("://") else {
            return self.0.clone();
        };
        let authority_start = scheme_end + 3;
        let authority_end = self.0[authority_start..]
            .find('/')
            .map(|i| authority_start + i)
            .unwrap_or(self.0.len());
        match self.0[authority_start..authority_end].rfind('@') {
            Some(at) => format!(
                "{}***{}",
                &self.0[..authority_start],
                &self.0[authority_start + at..]
            ),
            None => self.0.clone(),
        }
    }
}

impl fmt::Display for RepositoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for RepositoryAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RepositoryAddress")
            .field(&self.redacted())
            .finish()
    }
}

/// Truncated HEAD commit of a repository.
///
/// Only valid for the run that resolved it: the remote may move at any time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevisionTag(String);

impl RevisionTag {
    pub fn from_commit(commit: &str) -> Self {
        Self(commit.trim().chars().take(REVISION_TAG_LEN).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Name of a challenge image: `{challenge}-{revision}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageHandle(String);

impl ImageHandle {
    pub fn new(challenge: &ChallengeId, revision: &RevisionTag) -> Self {
        Self(format!("{}-{}", challenge, revision))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

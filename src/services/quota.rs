//! Subscription-tier quota checks.
//!
//! Check only: incrementing the usage is the job of the action that runs after
//! a successful check. The read and the later increment are not atomic, so
//! concurrent attempts near a limit can overshoot it by a few units.

use std::{fmt, str::FromStr, sync::Arc};

use crate::error::AppError;
use crate::repos::account_repo::Account;
use crate::repos::resource_repo::ResourceCountStore;

/// Closed set of quota-governed features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// Counted: resources owned, from the resource-count store.
    ResourceCreation,
    /// Counted: the account's own export counter.
    ExportPdf,
    /// Capability flag on the tier.
    CustomBranding,
}

impl Feature {
    pub const ALL: [Feature; 3] = [
        Feature::ResourceCreation,
        Feature::ExportPdf,
        Feature::CustomBranding,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::ResourceCreation => "resource_creation",
            Feature::ExportPdf => "export_pdf",
            Feature::CustomBranding => "custom_branding",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unrecognized feature '{0}'")]
pub struct UnrecognizedFeature(pub String);

impl FromStr for Feature {
    type Err = UnrecognizedFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnrecognizedFeature(s.to_string()))
    }
}

/// What to do with a feature identifier outside the closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnrecognizedFeaturePolicy {
    /// Pass through (forward compatible with features added before this gate knows them).
    #[default]
    Allow,
    /// Treat as not entitled.
    Deny,
}

impl FromStr for UnrecognizedFeaturePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            _ => Err(()),
        }
    }
}

/// Usage observed at decision time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Counted { current: u32, limit: Option<u32> },
    Capability { entitled: bool },
}

#[derive(Clone)]
pub struct QuotaEnforcer {
    resources: Arc<dyn ResourceCountStore>,
    unrecognized: UnrecognizedFeaturePolicy,
}

impl QuotaEnforcer {
    pub fn new(
        resources: Arc<dyn ResourceCountStore>,
        unrecognized: UnrecognizedFeaturePolicy,
    ) -> Self {
        Self {
            resources,
            unrecognized,
        }
    }

    /// Check a feature given by its wire identifier.
    pub async fn check_named(&self, account: &Account, feature: &str) -> Result<(), AppError> {
        match feature.parse::<Feature>() {
            Ok(feature) => self.check(account, feature).await,
            Err(e) => match self.unrecognized {
                UnrecognizedFeaturePolicy::Allow => {
                    tracing::debug!(error = %e, "unrecognized feature passed through");
                    Ok(())
                }
                UnrecognizedFeaturePolicy::Deny => {
                    tracing::warn!(
                        user_id = %account.id,
                        feature = %e.0,
                        "unrecognized feature denied"
                    );
                    Err(AppError::FeatureNotEntitled { feature: e.0 })
                }
            },
        }
    }

    pub async fn check(&self, account: &Account, feature: Feature) -> Result<(), AppError> {
        match self.usage(account, feature).await? {
            Usage::Counted { limit: None, .. } => Ok(()),
            Usage::Counted {
                current,
                limit: Some(limit),
            } => {
                // Inclusive: reaching the limit blocks the next action.
                if current >= limit {
                    tracing::info!(
                        user_id = %account.id,
                        tier = %account.tier.name,
                        feature = %feature,
                        current,
                        limit,
                        "quota exceeded"
                    );
                    return Err(AppError::QuotaExceeded {
                        feature: feature.as_str(),
                        limit,
                        current,
                    });
                }
                Ok(())
            }
            Usage::Capability { entitled: true } => Ok(()),
            Usage::Capability { entitled: false } => Err(AppError::FeatureNotEntitled {
                feature: feature.as_str().to_string(),
            }),
        }
    }

    /// Current usage and limit for `feature`. Only counted features touch a store.
    pub async fn usage(&self, account: &Account, feature: Feature) -> Result<Usage, AppError> {
        let limits = &account.tier.limits;
        let usage = match feature {
            Feature::ResourceCreation => match limits.max_resources {
                // Unlimited tiers skip the count query.
                None => Usage::Counted {
                    current: 0,
                    limit: None,
                },
                Some(limit) => Usage::Counted {
                    current: self.resources.count_owned_by(account.id).await?,
                    limit: Some(limit),
                },
            },
            Feature::ExportPdf => Usage::Counted {
                current: account.usage.pdf_exports,
                limit: limits.max_pdf_exports,
            },
            Feature::CustomBranding => Usage::Capability {
                entitled: limits.custom_branding,
            },
        };
        Ok(usage)
    }
}

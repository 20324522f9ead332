//! Storage account discovery by tag.
//!
//! An account holds the state for a `(level, environment)` pair when it is
//! tagged with both. Two generations of tag keys exist in the wild, so each
//! dimension is looked up under the current key first and the legacy key
//! only when the current one is absent.

use tokio_util::sync::CancellationToken;

use crate::cancel::run_cancellable;
use crate::error::ErrorKind;
use crate::storage::{ResolvedAccount, StorageAccount, StorageClient, Tags};

pub const TFSTATE_TAG: &str = "caf_tfstate";
pub const LEGACY_TFSTATE_TAG: &str = "tfstate";
pub const ENVIRONMENT_TAG: &str = "caf_environment";
pub const LEGACY_ENVIRONMENT_TAG: &str = "environment";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAccountFilter {
    pub level: String,
    pub environment: String,
}

impl StorageAccountFilter {
    pub fn new(level: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            environment: environment.into(),
        }
    }

    pub fn matches(&self, tags: Option<&Tags>) -> bool {
        let Some(tags) = tags else {
            return false;
        };

        tag_with_fallback(tags, TFSTATE_TAG, LEGACY_TFSTATE_TAG) == Some(self.level.as_str())
            && tag_with_fallback(tags, ENVIRONMENT_TAG, LEGACY_ENVIRONMENT_TAG)
                == Some(self.environment.as_str())
    }
}

/// Value under `primary`, or under `legacy` when `primary` has no value.
/// A key present with a null value counts as absent.
fn tag_with_fallback<'a>(tags: &'a Tags, primary: &str, legacy: &str) -> Option<&'a str> {
    tags.get(primary)
        .and_then(|v| v.as_deref())
        .or_else(|| tags.get(legacy).and_then(|v| v.as_deref()))
}

/// Resource group name from an ARM resource ID
/// (`/subscriptions/{sub}/resourceGroups/{rg}/providers/...`).
pub fn resource_group_from_id(id: &str) -> Option<&str> {
    let parts: Vec<&str> = id.split('/').collect();
    parts
        .windows(2)
        .find(|pair| pair[0] == "resourceGroups")
        .map(|pair| pair[1])
        .filter(|rg| !rg.is_empty())
}

fn to_resolved(account: StorageAccount) -> Result<ResolvedAccount, ErrorKind> {
    let id = account.id.unwrap_or_default();
    let resource_group = resource_group_from_id(&id)
        .ok_or_else(|| ErrorKind::ResourceGroup { id: id.clone() })?
        .to_string();

    Ok(ResolvedAccount {
        name: account.name,
        resource_group,
    })
}

/// Walks every page of the account listing and returns the first account
/// whose tags match `filter`.
///
/// NOTE: "first" follows the capability's page order. If several accounts
/// carry the same tags, which one wins is not defined.
pub async fn resolve<S>(
    storage: &S,
    filter: &StorageAccountFilter,
    cancel: &CancellationToken,
) -> Result<ResolvedAccount, ErrorKind>
where
    S: StorageClient + ?Sized,
{
    let mut continuation = None;
    let mut scanned = 0usize;

    loop {
        let page = run_cancellable(cancel, storage.list_accounts(continuation)).await?;
        scanned += page.accounts.len();

        if let Some(account) = page
            .accounts
            .into_iter()
            .find(|a| filter.matches(a.tags.as_ref()))
        {
            tracing::info!(
                account = %account.name,
                level = %filter.level,
                environment = %filter.environment,
                "storage account resolved"
            );
            return to_resolved(account);
        }

        match page.next {
            Some(next) => continuation = Some(next),
            None => break,
        }
    }

    tracing::debug!(scanned, "no storage account matched");

    Err(ErrorKind::Resolution {
        level: filter.level.clone(),
        environment: filter.environment.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use proptest::prelude::*;

    fn tags(pairs: &[(&str, Option<&str>)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
            .collect()
    }

    fn account(name: &str, tfstate: &str, env: &str) -> StorageAccount {
        StorageAccount {
            name: name.to_string(),
            id: Some(format!(
                "/subscriptions/sub1/resourceGroups/rg-{name}/providers/Microsoft.Storage/storageAccounts/{name}"
            )),
            tags: Some(tags(&[
                (TFSTATE_TAG, Some(tfstate)),
                (ENVIRONMENT_TAG, Some(env)),
            ])),
        }
    }

    #[test]
    fn test_matches_new_tag_keys() {
        let filter = StorageAccountFilter::new("level0", "sandpit");
        let t = tags(&[("caf_tfstate", Some("level0")), ("caf_environment", Some("sandpit"))]);
        assert!(filter.matches(Some(&t)));
    }

    #[test]
    fn test_matches_legacy_tag_keys() {
        let filter = StorageAccountFilter::new("level0", "sandpit");
        let t = tags(&[("tfstate", Some("level0")), ("environment", Some("sandpit"))]);
        assert!(filter.matches(Some(&t)));
    }

    #[test]
    fn test_matches_mixed_generations() {
        let filter = StorageAccountFilter::new("level1", "prod");
        let t = tags(&[("caf_tfstate", Some("level1")), ("environment", Some("prod"))]);
        assert!(filter.matches(Some(&t)));
    }

    #[test]
    fn test_new_key_shadows_legacy_key() {
        let filter = StorageAccountFilter::new("level0", "sandpit");
        let t = tags(&[
            ("caf_tfstate", Some("level1")),
            ("tfstate", Some("level0")),
            ("caf_environment", Some("sandpit")),
        ]);
        assert!(!filter.matches(Some(&t)));
    }

    #[test]
    fn test_valueless_new_key_falls_back() {
        let filter = StorageAccountFilter::new("level0", "sandpit");
        let t = tags(&[
            ("caf_tfstate", None),
            ("tfstate", Some("level0")),
            ("caf_environment", Some("sandpit")),
        ]);
        assert!(filter.matches(Some(&t)));
    }

    #[test]
    fn test_no_tags_never_match() {
        let filter = StorageAccountFilter::new("", "");
        assert!(!filter.matches(None));
        assert!(!filter.matches(Some(&Tags::new())));
    }

    #[test]
    fn test_resource_group_from_id() {
        assert_eq!(
            resource_group_from_id(
                "/subscriptions/sub1/resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/st1"
            ),
            Some("rg1")
        );
        assert_eq!(resource_group_from_id("/subscriptions/sub1/resourceGroups"), None);
        assert_eq!(resource_group_from_id("/subscriptions/sub1/resourceGroups/"), None);
        assert_eq!(resource_group_from_id(""), None);
    }

    #[tokio::test]
    async fn test_resolve_finds_account_on_later_page() {
        let storage = InMemoryStorage::new(vec![
            vec![account("sta", "level1", "sandpit")],
            vec![account("stb", "level0", "prod")],
            vec![account("stc", "level0", "sandpit")],
        ]);

        let resolved = resolve(
            &storage,
            &StorageAccountFilter::new("level0", "sandpit"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(resolved.name, "stc");
        assert_eq!(resolved.resource_group, "rg-stc");
        assert_eq!(storage.calls().list, 3);
    }

    #[tokio::test]
    async fn test_resolve_stops_at_first_match() {
        let storage = InMemoryStorage::new(vec![
            vec![account("first", "level0", "sandpit")],
            vec![account("second", "level0", "sandpit")],
        ]);

        let resolved = resolve(
            &storage,
            &StorageAccountFilter::new("level0", "sandpit"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(resolved.name, "first");
        assert_eq!(storage.calls().list, 1);
    }

    #[tokio::test]
    async fn test_resolve_without_match_fails() {
        let storage = InMemoryStorage::new(vec![
            vec![account("sta", "level1", "sandpit")],
            vec![],
        ]);

        let result = resolve(
            &storage,
            &StorageAccountFilter::new("level0", "sandpit"),
            &CancellationToken::new(),
        )
        .await;

        match result {
            Err(ErrorKind::Resolution { level, environment }) => {
                assert_eq!(level, "level0");
                assert_eq!(environment, "sandpit");
            }
            other => panic!("expected Resolution error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_resolve_propagates_listing_error() {
        let storage = InMemoryStorage::failing_on_page(
            vec![
                vec![account("sta", "level1", "sandpit")],
                vec![account("stb", "level0", "sandpit")],
            ],
            1,
        );

        let result = resolve(
            &storage,
            &StorageAccountFilter::new("level0", "sandpit"),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(ErrorKind::Transport(_))));
    }

    #[tokio::test]
    async fn test_resolve_requires_resource_group_in_id() {
        let mut bad = account("stx", "level0", "sandpit");
        bad.id = Some(
            "/subscriptions/sub1/providers/Microsoft.Storage/storageAccounts/stx".to_string(),
        );
        let storage = InMemoryStorage::new(vec![vec![bad]]);

        let result = resolve(
            &storage,
            &StorageAccountFilter::new("level0", "sandpit"),
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(ErrorKind::ResourceGroup { .. })));
    }

    #[tokio::test]
    async fn test_resolve_honours_cancellation() {
        let storage = InMemoryStorage::new(vec![vec![account("sta", "level0", "sandpit")]]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = resolve(
            &storage,
            &StorageAccountFilter::new("level0", "sandpit"),
            &cancel,
        )
        .await;

        assert!(matches!(result, Err(ErrorKind::Cancelled)));
        assert_eq!(storage.calls().list, 0);
    }

    fn tag_value() -> impl Strategy<Value = Option<Option<String>>> {
        prop_oneof![
            Just(None),
            Just(Some(None)),
            "(level0|level1|sandpit|prod)".prop_map(|s| Some(Some(s))),
        ]
    }

    proptest! {
        #[test]
        fn prop_matches_prefers_new_key(
            new_tf in tag_value(),
            old_tf in tag_value(),
            new_env in tag_value(),
            old_env in tag_value(),
            level in "(level0|level1)",
            environment in "(sandpit|prod)",
        ) {
            let mut t = Tags::new();
            for (key, value) in [
                (TFSTATE_TAG, &new_tf),
                (LEGACY_TFSTATE_TAG, &old_tf),
                (ENVIRONMENT_TAG, &new_env),
                (LEGACY_ENVIRONMENT_TAG, &old_env),
            ] {
                if let Some(v) = value {
                    t.insert(key.to_string(), v.clone());
                }
            }

            let effective =
                |new: &Option<Option<String>>, old: &Option<Option<String>>| -> Option<String> {
                    new.clone().flatten().or_else(|| old.clone().flatten())
                };
            let expected = effective(&new_tf, &old_tf).as_deref() == Some(level.as_str())
                && effective(&new_env, &old_env).as_deref() == Some(environment.as_str());

            let filter = StorageAccountFilter::new(level.clone(), environment.clone());
            prop_assert_eq!(filter.matches(Some(&t)), expected);
            prop_assert!(!filter.matches(None));
        }
    }
}

//! Deleting a manifest, and every tag pointing at it, from a repository

use crate::content::descriptor::Descriptor;
use crate::registry::reference::Reference;
use crate::registry::scope::delete_scope_hints;
use crate::registry::{ManifestStore, ScopeRegistry};
use crate::{OrasError, Result};
use std::io::{BufRead, Write};

/// Options of a manifest deletion
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    /// `<registry>/<repository>{:<tag>|@<digest>}`
    pub target_ref: String,
    /// Skip the confirmation prompt and ignore a missing manifest
    pub force: bool,
    /// Print the descriptor of the deleted manifest instead of a status line
    pub output_descriptor: bool,
    pub pretty: bool,
    /// Whether the registry serves the referrers API, if known
    pub referrers_api: Option<bool>,
}

impl DeleteOptions {
    /// Reject contradicting options before anything touches the network
    pub fn validate(&self) -> Result<()> {
        if self.force && self.output_descriptor {
            return Err(OrasError::Configuration(
                "--force cannot be used together with --descriptor: the descriptor must describe a confirmed deletion"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of a deletion that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(Descriptor),
    /// Manifest did not exist and `force` was set
    Missing,
    /// The user declined the confirmation prompt
    Declined,
}

/// Source of yes/no answers
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// Asks on a writer and reads the answer from a reader
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for Prompter<R, W> {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        write!(self.output, "{} [y/N] ", prompt)?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        let answer = answer.trim().to_ascii_lowercase();
        Ok(answer == "y" || answer == "yes")
    }
}

/// Delete the manifest named by `opts.target_ref` from `store`
///
/// The reference is resolved to a digest first; deleting by digest removes
/// every tag of the manifest, hence the confirmation. Status lines or the
/// descriptor go to `output`.
pub async fn delete_manifest<S, C, W>(
    store: &S,
    opts: &DeleteOptions,
    confirm: &mut C,
    output: &mut W,
) -> Result<DeleteOutcome>
where
    S: ManifestStore + ScopeRegistry + ?Sized,
    C: Confirm + ?Sized,
    W: Write + ?Sized,
{
    opts.validate()?;

    let reference = Reference::parse(&opts.target_ref)?;
    if reference.reference.is_empty() {
        return Err(OrasError::InvalidReference(opts.target_ref.clone()));
    }

    // token for resolve must already allow the delete and a possible
    // referrers index update
    let hints = delete_scope_hints(opts.referrers_api.into());
    store.register_scope_hints(&reference.repository, &hints);

    let desc = match store.resolve(&opts.target_ref).await {
        Ok(desc) => desc,
        Err(err) if err.is_not_found() => {
            if opts.force && !opts.output_descriptor {
                tracing::debug!("{} does not exist, nothing to delete", opts.target_ref);
                writeln!(output, "Missing {}", opts.target_ref)?;
                return Ok(DeleteOutcome::Missing);
            }
            return Err(OrasError::ManifestNotFound {
                reference: opts.target_ref.clone(),
            });
        }
        Err(err) => return Err(err),
    };

    let prompt = format!(
        "Are you sure you want to delete the manifest \"{}\" and all tags associated with it?",
        desc.digest
    );
    if !opts.force && !confirm.confirm(&prompt)? {
        tracing::debug!("deletion of {} declined", desc.digest);
        return Ok(DeleteOutcome::Declined);
    }

    store
        .delete(&desc)
        .await
        .map_err(|source| OrasError::Delete {
            reference: opts.target_ref.clone(),
            source: Box::new(source),
        })?;
    tracing::info!("deleted {} ({})", opts.target_ref, desc.digest);

    if opts.output_descriptor {
        let json = if opts.pretty {
            serde_json::to_vec_pretty(&desc)?
        } else {
            serde_json::to_vec(&desc)?
        };
        output.write_all(&json)?;
        writeln!(output)?;
    } else {
        writeln!(output, "Deleted {}", opts.target_ref)?;
    }

    Ok(DeleteOutcome::Deleted(desc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::descriptor::media_types;
    use crate::content::memory::MemoryStore;
    use crate::registry::scope::{AuthAction, ScopeHint};
    use crate::registry::Target;
    use async_trait::async_trait;

    const TARGET: &str = "localhost:5000/hello:v1";

    /// Scripted answers that remember what was asked
    struct Answer {
        yes: bool,
        asked: Vec<String>,
    }

    impl Answer {
        fn new(yes: bool) -> Self {
            Self { yes, asked: Vec::new() }
        }
    }

    impl Confirm for Answer {
        fn confirm(&mut self, prompt: &str) -> Result<bool> {
            self.asked.push(prompt.to_string());
            Ok(self.yes)
        }
    }

    fn options(force: bool, output_descriptor: bool) -> DeleteOptions {
        DeleteOptions {
            target_ref: TARGET.to_string(),
            force,
            output_descriptor,
            ..Default::default()
        }
    }

    async fn store_with_manifest() -> (MemoryStore, Descriptor) {
        let store = MemoryStore::new();
        let content = br#"{"schemaVersion":2}"#.to_vec();
        let manifest = Descriptor::from_bytes(media_types::OCI_IMAGE_MANIFEST, &content);
        store.tag(&manifest, content, "v1").await.unwrap();
        (store, manifest)
    }

    fn delete_calls(store: &MemoryStore) -> usize {
        store.events().iter().filter(|e| e.starts_with("delete")).count()
    }

    #[tokio::test]
    async fn test_deletes_after_confirmation() {
        let (store, manifest) = store_with_manifest().await;
        let mut answer = Answer::new(true);
        let mut output = Vec::<u8>::new();

        let outcome = delete_manifest(&store, &options(false, false), &mut answer, &mut output)
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::Deleted(manifest.clone()));
        assert_eq!(String::from_utf8(output).unwrap(), format!("Deleted {}\n", TARGET));
        assert_eq!(delete_calls(&store), 1);
        assert!(store.tagged("v1").is_none());
        assert_eq!(answer.asked.len(), 1);
        assert!(answer.asked[0].contains(manifest.digest.as_str()));
        assert!(answer.asked[0].contains("all tags"));
    }

    #[tokio::test]
    async fn test_declined_confirmation_is_not_an_error() {
        let (store, _) = store_with_manifest().await;
        let mut output = Vec::<u8>::new();

        let outcome = delete_manifest(&store, &options(false, false), &mut Answer::new(false), &mut output)
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::Declined);
        assert!(output.is_empty());
        assert_eq!(delete_calls(&store), 0);
        assert!(store.tagged("v1").is_some());
    }

    #[tokio::test]
    async fn test_force_skips_prompt() {
        let (store, _) = store_with_manifest().await;
        let mut answer = Answer::new(false);
        let mut output = Vec::<u8>::new();

        let outcome = delete_manifest(&store, &options(true, false), &mut answer, &mut output)
            .await
            .unwrap();

        assert!(matches!(outcome, DeleteOutcome::Deleted(_)));
        assert!(answer.asked.is_empty());
    }

    #[tokio::test]
    async fn test_missing_manifest_with_force() {
        let store = MemoryStore::new();
        let mut output = Vec::<u8>::new();

        let outcome = delete_manifest(&store, &options(true, false), &mut Answer::new(true), &mut output)
            .await
            .unwrap();

        assert_eq!(outcome, DeleteOutcome::Missing);
        assert_eq!(String::from_utf8(output).unwrap(), format!("Missing {}\n", TARGET));
        assert_eq!(delete_calls(&store), 0);
    }

    #[tokio::test]
    async fn test_missing_manifest_without_force() {
        let store = MemoryStore::new();
        let mut output = Vec::<u8>::new();

        let err = delete_manifest(&store, &options(false, false), &mut Answer::new(true), &mut output)
            .await
            .unwrap_err();

        assert!(matches!(err, OrasError::ManifestNotFound { .. }));
        let message = err.to_string();
        assert!(message.contains(TARGET));
        assert!(message.contains("does not exist"));
        assert_eq!(delete_calls(&store), 0);
    }

    #[tokio::test]
    async fn test_force_with_descriptor_is_rejected_before_resolve() {
        let (store, _) = store_with_manifest().await;
        let mut output = Vec::<u8>::new();

        let err = delete_manifest(&store, &options(true, true), &mut Answer::new(true), &mut output)
            .await
            .unwrap_err();

        assert!(matches!(err, OrasError::Configuration(_)));
        assert!(store.events().iter().all(|e| !e.starts_with("resolve")));
        assert!(store.scope_hints().is_empty());
    }

    #[tokio::test]
    async fn test_descriptor_output() {
        let (store, manifest) = store_with_manifest().await;
        let mut output = Vec::<u8>::new();
        let opts = DeleteOptions {
            pretty: true,
            ..options(false, true)
        };

        delete_manifest(&store, &opts, &mut Answer::new(true), &mut output)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("\n  \"mediaType\""));
        let printed: Descriptor = serde_json::from_str(&text).unwrap();
        assert_eq!(printed.digest, manifest.digest);
        assert_eq!(printed.size, manifest.size);
    }

    #[tokio::test]
    async fn test_bare_repository_is_invalid() {
        let store = MemoryStore::new();
        let opts = DeleteOptions {
            target_ref: "localhost:5000/hello".to_string(),
            ..Default::default()
        };

        let err = delete_manifest(&store, &opts, &mut Answer::new(true), &mut Vec::<u8>::new())
            .await
            .unwrap_err();

        assert!(matches!(err, OrasError::InvalidReference(_)));
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn test_scope_hints_registered_before_resolve() {
        let (store, _) = store_with_manifest().await;

        delete_manifest(&store, &options(true, false), &mut Answer::new(true), &mut Vec::<u8>::new())
            .await
            .unwrap();

        let events = store.events();
        let scope = events.iter().position(|e| e == "scope hello").unwrap();
        let resolve = events.iter().position(|e| e.starts_with("resolve")).unwrap();
        assert!(scope < resolve);

        let expected: ScopeHint = [AuthAction::Pull, AuthAction::Push, AuthAction::Delete]
            .into_iter()
            .collect();
        assert_eq!(store.scope_hints(), vec![("hello".to_string(), expected)]);
    }

    struct FailingDelete(MemoryStore);

    #[async_trait]
    impl ManifestStore for FailingDelete {
        async fn resolve(&self, reference: &str) -> Result<Descriptor> {
            self.0.resolve(reference).await
        }

        async fn delete(&self, _desc: &Descriptor) -> Result<()> {
            Err(OrasError::Registry("503 Service Unavailable".to_string()))
        }
    }

    impl ScopeRegistry for FailingDelete {
        fn register_scope_hints(&self, repository: &str, hints: &ScopeHint) {
            self.0.register_scope_hints(repository, hints)
        }
    }

    #[tokio::test]
    async fn test_delete_failure_carries_reference() {
        let (store, _) = store_with_manifest().await;
        let store = FailingDelete(store);
        let mut output = Vec::<u8>::new();

        let err = delete_manifest(&store, &options(true, false), &mut Answer::new(true), &mut output)
            .await
            .unwrap_err();

        match &err {
            OrasError::Delete { reference, source } => {
                assert_eq!(reference, TARGET);
                assert!(matches!(**source, OrasError::Registry(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with(&format!("failed to delete {}", TARGET)));
        assert!(output.is_empty());
    }

    #[test]
    fn test_prompter_reads_answer() {
        let mut prompt_out = Vec::new();
        let mut prompter = Prompter::new(&b"Yes\n"[..], &mut prompt_out);
        assert!(prompter.confirm("Delete?").unwrap());
        assert_eq!(String::from_utf8(prompt_out).unwrap(), "Delete? [y/N] ");

        let mut prompter = Prompter::new(&b"\n"[..], Vec::new());
        assert!(!prompter.confirm("Delete?").unwrap());
    }
}

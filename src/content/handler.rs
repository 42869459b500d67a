//! Descriptor handlers and the concurrent walker that drives them

use crate::content::descriptor::{Descriptor, Digest};
use crate::Result;
use async_trait::async_trait;
use futures_util::future::{try_join_all, BoxFuture, FutureExt};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// A unit of descriptor processing
///
/// Returns the descriptors that depend on `desc` and should be visited
/// next, e.g. the blobs referenced by a manifest. Implementations must be
/// safe to call concurrently for different descriptors.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, desc: &Descriptor) -> Result<Vec<Descriptor>>;
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    async fn handle(&self, desc: &Descriptor) -> Result<Vec<Descriptor>> {
        (**self).handle(desc).await
    }
}

/// Handler backed by a synchronous closure
pub struct HandlerFn<F>(F);

/// Wrap a closure as a [`Handler`]
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&Descriptor) -> Result<Vec<Descriptor>> + Send + Sync,
{
    HandlerFn(f)
}

#[async_trait]
impl<F> Handler for HandlerFn<F>
where
    F: Fn(&Descriptor) -> Result<Vec<Descriptor>> + Send + Sync,
{
    async fn handle(&self, desc: &Descriptor) -> Result<Vec<Descriptor>> {
        (self.0)(desc)
    }
}

/// Ordered chain of handlers
///
/// Every handler runs for each descriptor, in registration order. Children
/// from all handlers are concatenated; the first error aborts the chain.
#[derive(Clone, Default)]
pub struct Handlers(Vec<Arc<dyn Handler>>);

impl FromIterator<Arc<dyn Handler>> for Handlers {
    fn from_iter<I: IntoIterator<Item = Arc<dyn Handler>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Arc<dyn Handler>> for Handlers {
    fn extend<I: IntoIterator<Item = Arc<dyn Handler>>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

#[async_trait]
impl Handler for Handlers {
    async fn handle(&self, desc: &Descriptor) -> Result<Vec<Descriptor>> {
        let mut children = Vec::new();
        for handler in &self.0 {
            children.extend(handler.handle(desc).await?);
        }
        Ok(children)
    }
}

/// Name validator applied to the files of a push
pub type NameValidator = Arc<dyn Fn(&Descriptor) -> Result<()> + Send + Sync>;

/// Runs the name validator on the file descriptors of a push
///
/// Files are matched by digest and name together. A config or manifest
/// sharing bytes with a named file is not a file and is never checked.
pub struct NameValidation {
    validate: NameValidator,
    files: HashSet<VisitKey>,
}

impl NameValidation {
    pub fn new<'a>(validate: NameValidator, files: impl IntoIterator<Item = &'a Descriptor>) -> Self {
        Self {
            validate,
            files: files.into_iter().map(visit_key).collect(),
        }
    }
}

#[async_trait]
impl Handler for NameValidation {
    async fn handle(&self, desc: &Descriptor) -> Result<Vec<Descriptor>> {
        if self.files.contains(&visit_key(desc)) {
            (self.validate)(desc)?;
        }
        Ok(Vec::new())
    }
}

/// Identity of a descriptor during a walk: same bytes under different
/// names are different entries
type VisitKey = (Digest, Option<String>);

fn visit_key(desc: &Descriptor) -> VisitKey {
    (desc.digest.clone(), desc.name().map(str::to_string))
}

/// Walk descriptors and their children through `handler`
///
/// Siblings are handled concurrently. Each (digest, name) pair is handled
/// at most once, so files sharing content are each seen. Returns every visited descriptor with children ordered before their
/// parents.
pub async fn dispatch(handler: &dyn Handler, roots: &[Descriptor]) -> Result<Vec<Descriptor>> {
    let visited = Mutex::new(HashSet::new());
    let order = Mutex::new(Vec::new());

    walk(handler, roots, &visited, &order).await?;

    Ok(order.into_inner().unwrap_or_else(PoisonError::into_inner))
}

fn walk<'a>(
    handler: &'a dyn Handler,
    descs: &'a [Descriptor],
    visited: &'a Mutex<HashSet<VisitKey>>,
    order: &'a Mutex<Vec<Descriptor>>,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let pending: Vec<&Descriptor> = {
            let mut seen = visited.lock().unwrap_or_else(PoisonError::into_inner);
            descs
                .iter()
                .filter(|d| seen.insert(visit_key(d)))
                .collect()
        };

        try_join_all(pending.into_iter().map(|desc| async move {
            let children = handler.handle(desc).await?;
            if !children.is_empty() {
                tracing::debug!("{} has {} children", desc.digest, children.len());
                walk(handler, &children, visited, order).await?;
            }
            order
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(desc.clone());
            Ok::<_, crate::OrasError>(())
        }))
        .await?;

        Ok(())
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::descriptor::media_types;
    use crate::content::validate::validate_name_as_path;
    use crate::OrasError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn blob(data: &[u8], name: &str) -> Descriptor {
        Descriptor::from_bytes(media_types::OCI_LAYER_TAR, data).with_name(name)
    }

    #[tokio::test]
    async fn test_handlers_run_in_order_and_concat_children() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let child = blob(b"child", "child.txt");

        let first_calls = calls.clone();
        let first_child = child.clone();
        let second_calls = calls.clone();

        let handlers: Handlers = vec![
            Arc::new(handler_fn(move |_| {
                first_calls.lock().unwrap().push("first");
                Ok(vec![first_child.clone()])
            })) as Arc<dyn Handler>,
            Arc::new(handler_fn(move |_| {
                second_calls.lock().unwrap().push("second");
                Ok(Vec::new())
            })),
        ]
        .into_iter()
        .collect();

        let children = handlers.handle(&blob(b"root", "root")).await.unwrap();
        assert_eq!(children, vec![child]);
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_handlers_stop_on_error() {
        let reached = Arc::new(AtomicUsize::new(0));
        let counter = reached.clone();

        let handlers: Handlers = vec![
            Arc::new(handler_fn(|_| Err(OrasError::Registry("boom".to_string())))) as Arc<dyn Handler>,
            Arc::new(handler_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::new())
            })),
        ]
        .into_iter()
        .collect();

        assert!(handlers.handle(&blob(b"x", "x")).await.is_err());
        assert_eq!(reached.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_name_validation_only_checks_files() {
        let file = blob(b"file", "../escape");
        let manifest = Descriptor::from_bytes(media_types::OCI_IMAGE_MANIFEST, b"{}");

        let validator: NameValidator =
            Arc::new(|d: &Descriptor| -> Result<()> { Ok(validate_name_as_path(d)?) });
        let handler = NameValidation::new(validator, [&file]);

        assert!(handler.handle(&manifest).await.unwrap().is_empty());
        let err = handler.handle(&file).await.unwrap_err();
        assert!(matches!(err, OrasError::Validation(_)));
    }

    #[tokio::test]
    async fn test_name_validation_matches_digest_and_name() {
        let file = blob(b"{}", "empty.json");
        let config = Descriptor::from_bytes(media_types::OCI_IMAGE_CONFIG, b"{}");
        assert_eq!(file.digest, config.digest);

        let validator: NameValidator =
            Arc::new(|d: &Descriptor| -> Result<()> { Ok(validate_name_as_path(d)?) });
        let handler = NameValidation::new(validator, [&file]);

        handler.handle(&config).await.unwrap();
        handler.handle(&file).await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_visits_same_content_under_each_name() {
        let good = blob(b"same", "good.txt");
        let evil = blob(b"same", "../evil");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let names = seen.clone();
        let handler = handler_fn(move |desc| {
            names.lock().unwrap().push(desc.name().map(str::to_string));
            Ok(Vec::new())
        });

        let order = dispatch(&handler, &[good.clone(), evil.clone(), good.clone()]).await.unwrap();
        assert_eq!(order.len(), 2);

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![Some("../evil".to_string()), Some("good.txt".to_string())]);
    }

    #[tokio::test]
    async fn test_dispatch_visits_children_first_and_once() {
        let shared = blob(b"shared", "shared");
        let a = blob(b"a", "a");
        let b = blob(b"b", "b");
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        let (a2, b2, shared2) = (a.clone(), b.clone(), shared.clone());
        let handler = handler_fn(move |desc| {
            counter.fetch_add(1, Ordering::SeqCst);
            if desc == &a2 || desc == &b2 {
                Ok(vec![shared2.clone()])
            } else {
                Ok(Vec::new())
            }
        });

        let order = dispatch(&handler, &[a.clone(), b.clone()]).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(order.len(), 3);
        let pos = |d: &Descriptor| order.iter().position(|o| o == d).unwrap();
        assert!(pos(&shared) < pos(&a) || pos(&shared) < pos(&b));
        assert!(order.contains(&a) && order.contains(&b));
    }

    #[tokio::test]
    async fn test_dispatch_propagates_errors() {
        let handler = handler_fn(|desc| {
            if desc.name() == Some("bad") {
                Err(OrasError::Registry("rejected".to_string()))
            } else {
                Ok(Vec::new())
            }
        });

        let result = dispatch(&handler, &[blob(b"1", "good"), blob(b"2", "bad")]).await;
        assert!(result.is_err());
    }
}

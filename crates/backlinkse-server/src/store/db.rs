use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use redb::{
    Database, ReadableTable, ReadableTableMetadata, TableError, WriteTransaction,
};
use tracing::{debug, info, warn};

use super::document::{check_id, decode, encode, table, Document, Exclusive, StoreError};

/// Thread-safe handle to the redb store.
#[derive(Clone)]
pub struct Store {
    pub(crate) db: Arc<Database>,
}

/// A single open write transaction. Every change made through it commits or
/// aborts together.
pub struct Txn<'a> {
    pub(crate) inner: &'a WriteTransaction,
}

impl Store {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).context("open redb database")?;

        let write_txn = db.begin_write()?;
        write_txn.open_table(super::users::USER_EMAILS)?;
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Run `f` inside one write transaction. Commits when `f` returns `Ok`,
    /// aborts otherwise.
    pub fn write<R>(&self, f: impl FnOnce(&Txn<'_>) -> Result<R>) -> Result<R> {
        let write_txn = self.db.begin_write().context("begin write")?;
        let outcome = f(&Txn { inner: &write_txn });
        match outcome {
            Ok(value) => {
                write_txn.commit().context("commit")?;
                Ok(value)
            }
            Err(e) => {
                if let Err(abort) = write_txn.abort() {
                    warn!(error = %abort, "abort write transaction");
                }
                Err(e)
            }
        }
    }

    pub fn get<D: Document>(&self, id: &str) -> Result<Option<D>> {
        check_id(id)?;
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(table::<D>()) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let raw = table.get(id)?.map(|guard| guard.value().to_vec());
        raw.map(|bytes| decode(&bytes)).transpose()
    }

    pub fn list<D: Document>(&self) -> Result<Vec<D>> {
        self.find(|_: &D| true)
    }

    pub fn find<D: Document>(&self, pred: impl Fn(&D) -> bool) -> Result<Vec<D>> {
        let read_txn = self.db.begin_read()?;
        let table = match read_txn.open_table(table::<D>()) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let doc: D = decode(value.value())?;
            if pred(&doc) {
                out.push(doc);
            }
        }
        Ok(out)
    }

    pub fn find_one<D: Document>(&self, pred: impl Fn(&D) -> bool) -> Result<Option<D>> {
        Ok(self.find(pred)?.into_iter().next())
    }

    pub fn count<D: Document>(&self) -> Result<u64> {
        let read_txn = self.db.begin_read()?;
        match read_txn.open_table(table::<D>()) {
            Ok(t) => Ok(t.len()?),
            Err(TableError::TableDoesNotExist(_)) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    pub fn insert<D: Document>(&self, doc: &D) -> Result<()> {
        self.write(|txn| txn.put(doc))?;
        debug!(collection = D::COLLECTION, id = doc.id(), "inserted");
        Ok(())
    }

    /// Atomic read-modify-write of one document. Returns `None` if absent.
    pub fn update<D: Document>(
        &self,
        id: &str,
        f: impl FnOnce(&mut D) -> Result<()>,
    ) -> Result<Option<D>> {
        check_id(id)?;
        self.write(|txn| {
            let Some(mut doc) = txn.get::<D>(id)? else {
                return Ok(None);
            };
            f(&mut doc)?;
            txn.put(&doc)?;
            Ok(Some(doc))
        })
    }

    /// Apply `f` to every document matching `pred`, in one transaction.
    pub fn update_many<D: Document>(
        &self,
        pred: impl Fn(&D) -> bool,
        f: impl Fn(&mut D),
    ) -> Result<usize> {
        self.write(|txn| txn.update_where(pred, f))
    }

    pub fn delete<D: Document>(&self, id: &str) -> Result<Option<D>> {
        check_id(id)?;
        self.write(|txn| txn.remove::<D>(id))
    }

    /// Insert `defaults` when the collection is empty. Returns how many
    /// documents were inserted; `0` means the collection already had data.
    ///
    /// The emptiness check and the insert share one write transaction, and
    /// redb serializes writers, so concurrent first reads seed exactly once.
    pub fn ensure_seeded<D: Document>(
        &self,
        defaults: impl FnOnce() -> Result<Vec<D>>,
    ) -> Result<usize> {
        if self.count::<D>()? > 0 {
            return Ok(0);
        }
        let inserted = self.write(|txn| {
            if !txn.is_empty::<D>()? {
                return Ok(0);
            }
            let docs = defaults()?;
            for doc in &docs {
                txn.put(doc)?;
            }
            Ok(docs.len())
        })?;
        if inserted > 0 {
            info!(collection = D::COLLECTION, count = inserted, "seeded defaults");
        }
        Ok(inserted)
    }

    /// Insert `doc`; if it is selected, deselect every other document in its
    /// scope within the same transaction.
    pub fn insert_exclusive<D: Exclusive>(&self, doc: &D) -> Result<()> {
        self.write(|txn| txn.put_exclusive(doc))
    }

    /// Like [`Store::update`], but keeps the at-most-one-selected invariant.
    pub fn update_exclusive<D: Exclusive>(
        &self,
        id: &str,
        f: impl FnOnce(&mut D) -> Result<()>,
    ) -> Result<Option<D>> {
        check_id(id)?;
        self.write(|txn| {
            let Some(mut doc) = txn.get::<D>(id)? else {
                return Ok(None);
            };
            f(&mut doc)?;
            txn.put_exclusive(&doc)?;
            Ok(Some(doc))
        })
    }

    /// Select `id` and deselect the rest of its scope.
    pub fn activate<D: Exclusive>(&self, id: &str) -> Result<Option<D>> {
        self.update_exclusive(id, |doc: &mut D| {
            doc.set_selected(true);
            Ok(())
        })
    }

    /// The selected unscoped document, inserting `default` as the selected one
    /// if none is.
    pub fn ensure_active<D: Exclusive>(&self, default: impl FnOnce() -> Result<D>) -> Result<D> {
        if let Some(doc) = self.find_one(|d: &D| d.is_selected() && d.scope().is_none())? {
            return Ok(doc);
        }
        self.write(|txn| {
            let existing = txn
                .all::<D>()?
                .into_iter()
                .find(|d| d.is_selected() && d.scope().is_none());
            if let Some(doc) = existing {
                return Ok(doc);
            }
            let mut doc = default()?;
            doc.set_selected(true);
            txn.put(&doc)?;
            info!(collection = D::COLLECTION, id = doc.id(), "seeded active default");
            Ok(doc)
        })
    }
}

impl Txn<'_> {
    pub fn get<D: Document>(&self, id: &str) -> Result<Option<D>> {
        let table = self.inner.open_table(table::<D>())?;
        let raw = table.get(id)?.map(|guard| guard.value().to_vec());
        raw.map(|bytes| decode(&bytes)).transpose()
    }

    pub fn all<D: Document>(&self) -> Result<Vec<D>> {
        let table = self.inner.open_table(table::<D>())?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            out.push(decode(value.value())?);
        }
        Ok(out)
    }

    pub fn is_empty<D: Document>(&self) -> Result<bool> {
        let table = self.inner.open_table(table::<D>())?;
        Ok(table.is_empty()?)
    }

    /// Insert or overwrite `doc`, enforcing its unique key.
    pub fn put<D: Document>(&self, doc: &D) -> Result<()> {
        if let Some((field, value)) = doc.unique_key() {
            let taken = self.all::<D>()?.into_iter().any(|other| {
                other.id() != doc.id()
                    && other.unique_key().is_some_and(|(_, v)| v == value)
            });
            if taken {
                return Err(StoreError::Duplicate {
                    field: field.to_owned(),
                }
                .into());
            }
        }
        let bytes = encode(doc)?;
        let mut table = self.inner.open_table(table::<D>())?;
        table.insert(doc.id(), bytes.as_slice())?;
        Ok(())
    }

    pub fn remove<D: Document>(&self, id: &str) -> Result<Option<D>> {
        let mut table = self.inner.open_table(table::<D>())?;
        let raw = table.remove(id)?.map(|guard| guard.value().to_vec());
        raw.map(|bytes| decode(&bytes)).transpose()
    }

    pub fn update_where<D: Document>(
        &self,
        pred: impl Fn(&D) -> bool,
        f: impl Fn(&mut D),
    ) -> Result<usize> {
        let mut changed = 0;
        for mut doc in self.all::<D>()? {
            if pred(&doc) {
                f(&mut doc);
                self.put(&doc)?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// [`Txn::put`] that first deselects the rest of the scope when `doc`
    /// is selected.
    pub fn put_exclusive<D: Exclusive>(&self, doc: &D) -> Result<()> {
        if doc.is_selected() {
            self.deselect_others(doc)?;
        }
        self.put(doc)
    }

    fn deselect_others<D: Exclusive>(&self, keep: &D) -> Result<usize> {
        let scope = keep.scope().map(str::to_owned);
        self.update_where(
            |other: &D| {
                other.id() != keep.id()
                    && other.is_selected()
                    && other.scope().map(str::to_owned) == scope
            },
            |other| other.set_selected(false),
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::document::new_id;
    use serde::{Deserialize, Serialize};
    use tempfile::tempdir;

    pub(crate) fn make_store() -> (Store, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Store::open(&dir.path().join("test.db")).unwrap();
        (store, dir)
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        slug: String,
        owner: Option<String>,
        pinned: bool,
    }

    impl Note {
        fn new(slug: &str) -> Self {
            Self {
                id: new_id(),
                slug: slug.into(),
                owner: None,
                pinned: false,
            }
        }
    }

    impl Document for Note {
        const COLLECTION: &'static str = "notes";
        fn id(&self) -> &str {
            &self.id
        }
        fn unique_key(&self) -> Option<(&'static str, String)> {
            Some(("slug", self.slug.clone()))
        }
    }

    impl Exclusive for Note {
        fn is_selected(&self) -> bool {
            self.pinned
        }
        fn set_selected(&mut self, selected: bool) {
            self.pinned = selected;
        }
        fn scope(&self) -> Option<&str> {
            self.owner.as_deref()
        }
    }

    #[test]
    fn insert_get_delete() {
        let (store, _dir) = make_store();
        let note = Note::new("a");
        store.insert(&note).unwrap();
        assert_eq!(store.get::<Note>(&note.id).unwrap(), Some(note.clone()));
        assert_eq!(store.count::<Note>().unwrap(), 1);

        let removed = store.delete::<Note>(&note.id).unwrap();
        assert_eq!(removed, Some(note.clone()));
        assert_eq!(store.get::<Note>(&note.id).unwrap(), None);
    }

    #[test]
    fn reads_on_missing_table_are_empty() {
        let (store, _dir) = make_store();
        assert!(store.list::<Note>().unwrap().is_empty());
        assert_eq!(store.count::<Note>().unwrap(), 0);
        assert_eq!(store.get::<Note>(&new_id()).unwrap(), None);
    }

    #[test]
    fn invalid_id_is_typed_error() {
        let (store, _dir) = make_store();
        let err = store.get::<Note>("nope").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::InvalidId(_))
        ));
    }

    #[test]
    fn unique_key_rejects_duplicates_but_allows_self_update() {
        let (store, _dir) = make_store();
        let a = Note::new("same");
        store.insert(&a).unwrap();
        let err = store.insert(&Note::new("same")).unwrap_err();
        assert!(StoreError::is_duplicate(&err));

        let updated = store
            .update::<Note>(&a.id, |n| {
                n.pinned = true;
                Ok(())
            })
            .unwrap()
            .unwrap();
        assert!(updated.pinned);
        assert_eq!(store.count::<Note>().unwrap(), 1);
    }

    #[test]
    fn failed_write_rolls_back() {
        let (store, _dir) = make_store();
        let result: Result<()> = store.write(|txn| {
            txn.put(&Note::new("x"))?;
            anyhow::bail!("boom")
        });
        assert!(result.is_err());
        assert_eq!(store.count::<Note>().unwrap(), 0);
    }

    #[test]
    fn ensure_seeded_inserts_once() {
        let (store, _dir) = make_store();
        let first = store
            .ensure_seeded(|| Ok(vec![Note::new("a"), Note::new("b")]))
            .unwrap();
        assert_eq!(first, 2);
        let second = store
            .ensure_seeded(|| Ok(vec![Note::new("c"), Note::new("d")]))
            .unwrap();
        assert_eq!(second, 0);
        assert_eq!(store.count::<Note>().unwrap(), 2);
    }

    #[test]
    fn ensure_seeded_concurrently_seeds_once() {
        let (store, _dir) = make_store();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    store
                        .ensure_seeded(|| Ok(vec![Note::new("a"), Note::new("b"), Note::new("c")]))
                        .unwrap()
                })
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 3);
        assert_eq!(store.count::<Note>().unwrap(), 3);
    }

    #[test]
    fn exclusive_insert_and_activate_keep_one_selected() {
        let (store, _dir) = make_store();
        let mut a = Note::new("a");
        a.pinned = true;
        store.insert_exclusive(&a).unwrap();
        let mut b = Note::new("b");
        b.pinned = true;
        store.insert_exclusive(&b).unwrap();

        let pinned: Vec<_> = store.find(|n: &Note| n.pinned).unwrap();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].id, b.id);

        store.activate::<Note>(&a.id).unwrap().unwrap();
        let pinned: Vec<_> = store.find(|n: &Note| n.pinned).unwrap();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].id, a.id);
    }

    #[test]
    fn exclusive_scopes_are_independent() {
        let (store, _dir) = make_store();
        let mut mine = Note::new("m");
        mine.owner = Some("u1".into());
        mine.pinned = true;
        let mut theirs = Note::new("t");
        theirs.owner = Some("u2".into());
        theirs.pinned = true;
        store.insert_exclusive(&mine).unwrap();
        store.insert_exclusive(&theirs).unwrap();
        assert_eq!(store.find(|n: &Note| n.pinned).unwrap().len(), 2);
    }

    #[test]
    fn ensure_active_seeds_only_when_nothing_active() {
        let (store, _dir) = make_store();
        let first = store.ensure_active(|| Ok(Note::new("default"))).unwrap();
        assert!(first.pinned);
        let again = store.ensure_active(|| Ok(Note::new("other"))).unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(store.count::<Note>().unwrap(), 1);
    }

    #[test]
    fn update_many_touches_matches_only() {
        let (store, _dir) = make_store();
        store.insert(&Note::new("a")).unwrap();
        store.insert(&Note::new("b")).unwrap();
        let changed = store
            .update_many(|n: &Note| n.slug == "a", |n| n.pinned = true)
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(store.find(|n: &Note| n.pinned).unwrap().len(), 1);
    }
}

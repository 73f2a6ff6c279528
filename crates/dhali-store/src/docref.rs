use dhali_core::{Cid, Rid};

/// Names a document across the collection/subcollection model of §3: a
/// private or public channel record, or a per-request estimate/exact record.
/// `to_key` gives the composite byte key used by storage backends that keep
/// every collection in a single keyspace (see [`crate::sled_store::SledStore`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DocRef {
    Private(Cid),
    Public(Cid),
    Estimate(Cid, Rid),
    Exact(Cid, Rid),
}

impl DocRef {
    pub fn to_key(&self) -> Vec<u8> {
        match self {
            DocRef::Private(cid) => format!("priv:{cid}").into_bytes(),
            DocRef::Public(cid) => format!("pub:{cid}").into_bytes(),
            DocRef::Estimate(cid, rid) => format!("est:{cid}:{rid}").into_bytes(),
            DocRef::Exact(cid, rid) => format!("exa:{cid}:{rid}").into_bytes(),
        }
    }

    /// The channel this document belongs to, for every variant.
    pub fn cid(&self) -> Cid {
        match self {
            DocRef::Private(cid)
            | DocRef::Public(cid)
            | DocRef::Estimate(cid, _)
            | DocRef::Exact(cid, _) => *cid,
        }
    }
}

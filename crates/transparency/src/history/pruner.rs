//! Top-down constructors of pruned history-tree traversals.
//!
//! Each pruner walks from the root position bounded by a version, asking
//! the resolver which subtrees are frozen and elidable. The result is a
//! [`Pruned`] value tree ready for a visitor chain.

use crate::cache::Cache;
use crate::error::TreeError;
use crate::position::TreePosition;
use crate::visit::Pruned;

use super::position::HistoryPosition;
use super::resolver::CacheResolver;

/// The ephemeral bundle a pruner traverses with; owns nothing.
pub struct PruningContext<'a> {
    pub resolver: &'a dyn CacheResolver,
    pub cache: &'a dyn Cache,
}

/// Builds the write-path traversal for appending one event.
///
/// The new leaf and every interior node whose range closes at this version
/// are wrapped `Collectable` so the caching and mutation visitors persist
/// exactly the newly-frozen set. A frozen sibling missing from the cache is
/// rebuilt from its descendants and re-collected.
pub struct InsertPruner<'a> {
    version: u64,
    event: &'a [u8],
    context: PruningContext<'a>,
}

impl<'a> InsertPruner<'a> {
    pub fn new(version: u64, event: &'a [u8], context: PruningContext<'a>) -> Self {
        Self {
            version,
            event,
            context,
        }
    }

    pub fn prune(&self) -> Result<Pruned<HistoryPosition>, TreeError> {
        self.traverse(HistoryPosition::root(self.version))
    }

    fn traverse(&self, pos: HistoryPosition) -> Result<Pruned<HistoryPosition>, TreeError> {
        if self.context.resolver.should_get_from_cache(&pos) {
            return match self.context.cache.get(&pos.bytes()) {
                Some(digest) => Ok(Pruned::Cached { pos, digest }),
                None if pos.is_leaf() => Err(TreeError::CacheMiss(format!("{pos:?}"))),
                None => {
                    // A lost frozen hash: rebuild it from its descendants
                    // and mark it for collection again.
                    let left = self.traverse(pos.left())?;
                    let right = self.traverse(pos.right())?;
                    Ok(collectable(
                        pos,
                        Pruned::Computed {
                            pos,
                            left: Box::new(left),
                            right: Box::new(right),
                        },
                    ))
                }
            };
        }

        if pos.is_leaf() {
            // The target leaf; its singleton range freezes immediately.
            return Ok(collectable(
                pos,
                Pruned::Leaf {
                    pos,
                    value: self.event.to_vec(),
                },
            ));
        }

        let left = self.traverse(pos.left())?;
        let right_pos = pos.right();
        let node = if right_pos.index() <= self.version {
            Pruned::Computed {
                pos,
                left: Box::new(left),
                right: Box::new(self.traverse(right_pos)?),
            }
        } else {
            Pruned::Partial {
                pos,
                left: Box::new(left),
            }
        };

        if pos.last_index() == self.version {
            Ok(collectable(pos, node))
        } else {
            Ok(node)
        }
    }
}

/// Builds the read-path traversal for a proof.
///
/// No writes happen; a cache miss on a frozen position is a
/// [`TreeError::CacheMiss`], because proof paths assume every frozen
/// sibling is retrievable. Off-path cached nodes and target leaves are
/// wrapped `Collectable` for the audit-path visitor, except the leaf in
/// `exclude` (a membership verifier recomputes that one from the event
/// digest itself).
pub struct SearchPruner<'a> {
    version: u64,
    exclude: Option<u64>,
    context: PruningContext<'a>,
}

impl<'a> SearchPruner<'a> {
    pub fn new(version: u64, exclude: Option<u64>, context: PruningContext<'a>) -> Self {
        Self {
            version,
            exclude,
            context,
        }
    }

    pub fn prune(&self) -> Result<Pruned<HistoryPosition>, TreeError> {
        self.traverse(HistoryPosition::root(self.version))
    }

    fn traverse(&self, pos: HistoryPosition) -> Result<Pruned<HistoryPosition>, TreeError> {
        if self.context.resolver.should_get_from_cache(&pos) {
            let digest = self.fetch(&pos)?;
            return Ok(collectable(pos, Pruned::Cached { pos, digest }));
        }

        if pos.is_leaf() {
            let digest = self.fetch(&pos)?;
            let node = Pruned::Cached { pos, digest };
            return Ok(if self.exclude == Some(pos.index()) {
                node
            } else {
                collectable(pos, node)
            });
        }

        let left = self.traverse(pos.left())?;
        let right_pos = pos.right();
        Ok(if right_pos.index() <= self.version {
            Pruned::Computed {
                pos,
                left: Box::new(left),
                right: Box::new(self.traverse(right_pos)?),
            }
        } else {
            Pruned::Partial {
                pos,
                left: Box::new(left),
            }
        })
    }

    fn fetch(&self, pos: &HistoryPosition) -> Result<veritree_crypto::Digest, TreeError> {
        self.context
            .cache
            .get(&pos.bytes())
            .ok_or_else(|| TreeError::CacheMiss(format!("{pos:?}")))
    }
}

/// Rebuilds a commitment from an audit path acting as the cache.
///
/// Stateless: the only hash sources are the proof and, for membership
/// verification, the event digest substituted at the target leaf.
pub struct VerifyPruner<'a> {
    version: u64,
    target: Option<(u64, &'a [u8])>,
    context: PruningContext<'a>,
}

impl<'a> VerifyPruner<'a> {
    pub fn new(
        version: u64,
        target: Option<(u64, &'a [u8])>,
        context: PruningContext<'a>,
    ) -> Self {
        Self {
            version,
            target,
            context,
        }
    }

    pub fn prune(&self) -> Result<Pruned<HistoryPosition>, TreeError> {
        self.traverse(HistoryPosition::root(self.version))
    }

    fn traverse(&self, pos: HistoryPosition) -> Result<Pruned<HistoryPosition>, TreeError> {
        if self.context.resolver.should_get_from_cache(&pos) {
            return Ok(Pruned::Cached {
                pos,
                digest: self.fetch(&pos)?,
            });
        }

        if pos.is_leaf() {
            if let Some((index, event)) = self.target {
                if pos.index() == index {
                    return Ok(Pruned::Leaf {
                        pos,
                        value: event.to_vec(),
                    });
                }
            }
            return Ok(Pruned::Cached {
                pos,
                digest: self.fetch(&pos)?,
            });
        }

        let left = self.traverse(pos.left())?;
        let right_pos = pos.right();
        Ok(if right_pos.index() <= self.version {
            Pruned::Computed {
                pos,
                left: Box::new(left),
                right: Box::new(self.traverse(right_pos)?),
            }
        } else {
            Pruned::Partial {
                pos,
                left: Box::new(left),
            }
        })
    }

    fn fetch(&self, pos: &HistoryPosition) -> Result<veritree_crypto::Digest, TreeError> {
        self.context
            .cache
            .get(&pos.bytes())
            .ok_or_else(|| TreeError::CacheMiss(format!("{pos:?}")))
    }
}

fn collectable(pos: HistoryPosition, child: Pruned<HistoryPosition>) -> Pruned<HistoryPosition> {
    Pruned::Collectable {
        pos,
        child: Box::new(child),
    }
}

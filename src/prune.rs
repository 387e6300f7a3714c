//! Graph finalizer: drop everything that takes no part in a match.
use tracing::debug;

use crate::field::{FieldArena, FieldId};
use crate::generator::Function;

/// Remove unmatched fields. A composite survives when some descendant is
/// matched, since emission needs it as a path element. Roots that end up
/// empty are removed from the function.
pub fn prune(function: &mut Function) {
    let arena = &mut function.arena;
    function.to.retain(|&root| prune_field(arena, root));
    function.from.retain(|&root| prune_field(arena, root));
    debug!(
        function = %function.name,
        to = function.to.len(),
        from = function.from.len(),
        "pruned"
    );
}

/// Returns whether `id` survives.
fn prune_field(arena: &mut FieldArena, id: FieldId) -> bool {
    for child in arena[id].children.clone() {
        if !prune_field(arena, child) {
            arena.detach(child);
        }
    }
    arena[id].is_matched() || !arena[id].children.is_empty()
}

//! Detection of contradicting headers from the same generator

use crate::header::BlockHeader;
use std::fmt;

/// Which contradiction condition two headers violate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContradictionKind {
    /// Same maxHeightPrevoted but the later header is not higher
    /// (double forging, or switching chains without justification)
    ForkChoiceRule,
    /// Earlier header is above the later header's maxHeightPreviouslyForged
    ChainDisjoint,
    /// maxHeightPrevoted went down between the two headers
    LowerChainBranch,
}

impl fmt::Display for ContradictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContradictionKind::ForkChoiceRule => "fork choice rule violated",
            ContradictionKind::ChainDisjoint => "chain disjoint",
            ContradictionKind::LowerChainBranch => "lower chain branch",
        };
        f.write_str(name)
    }
}

fn forging_order_key(header: &BlockHeader) -> (u32, u32, u32) {
    (
        header.asset.max_height_previously_forged,
        header.asset.max_height_prevoted,
        header.height,
    )
}

/// Classify the contradiction between two headers, if any.
///
/// Symmetric in its arguments. Headers from different generators, or the
/// same header twice, never contradict.
pub fn contradiction(first: &BlockHeader, second: &BlockHeader) -> Option<ContradictionKind> {
    let (earlier, later) = if forging_order_key(first) > forging_order_key(second) {
        (second, first)
    } else {
        (first, second)
    };

    if earlier.generator_public_key != later.generator_public_key || earlier.id == later.id {
        return None;
    }

    // order of checks matters
    if earlier.asset.max_height_prevoted == later.asset.max_height_prevoted
        && earlier.height >= later.height
    {
        return Some(ContradictionKind::ForkChoiceRule);
    }
    if earlier.height > later.asset.max_height_previously_forged {
        return Some(ContradictionKind::ChainDisjoint);
    }
    if earlier.asset.max_height_prevoted > later.asset.max_height_prevoted {
        return Some(ContradictionKind::LowerChainBranch);
    }
    None
}

/// True if the two headers assert mutually exclusive chain views.
pub fn contradicts(first: &BlockHeader, second: &BlockHeader) -> bool {
    contradiction(first, second).is_some()
}

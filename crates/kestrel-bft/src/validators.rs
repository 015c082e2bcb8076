//! Active validator lookup

use crate::error::BftResult;
use kestrel_primitives::Address;

/// A validator of the round containing some height
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveValidator {
    /// Validator address
    pub address: Address,
    /// Whether the validator's headers count as votes
    pub is_consensus_participant: bool,
    /// First height from which the validator's votes count
    pub min_active_height: u32,
}

impl ActiveValidator {
    /// Create a participating validator active since `min_active_height`
    pub fn new(address: Address, min_active_height: u32) -> Self {
        Self {
            address,
            is_consensus_participant: true,
            min_active_height,
        }
    }

    /// Create a validator whose headers are not counted as votes
    pub fn standby(address: Address, min_active_height: u32) -> Self {
        Self {
            address,
            is_consensus_participant: false,
            min_active_height,
        }
    }
}

/// Source of the validator list for the round containing a height
pub trait ValidatorProvider: Send + Sync {
    /// Validators of the round containing `height`
    fn validators_at(&self, height: u32) -> BftResult<Vec<ActiveValidator>>;
}

impl<F> ValidatorProvider for F
where
    F: Fn(u32) -> BftResult<Vec<ActiveValidator>> + Send + Sync,
{
    fn validators_at(&self, height: u32) -> BftResult<Vec<ActiveValidator>> {
        self(height)
    }
}

/// Fixed validator list used for every height
#[derive(Clone, Debug, Default)]
pub struct ValidatorSet {
    validators: Vec<ActiveValidator>,
}

impl ValidatorSet {
    /// Create an empty validator set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from a list of validators
    pub fn from_validators(validators: Vec<ActiveValidator>) -> Self {
        Self { validators }
    }

    /// Add a validator, replacing any entry with the same address
    pub fn add(&mut self, validator: ActiveValidator) {
        match self.validators.iter_mut().find(|v| v.address == validator.address) {
            Some(existing) => *existing = validator,
            None => self.validators.push(validator),
        }
    }

    /// Get validator by address
    pub fn get(&self, address: &Address) -> Option<&ActiveValidator> {
        self.validators.iter().find(|v| &v.address == address)
    }

    /// Check if address is a validator
    pub fn contains(&self, address: &Address) -> bool {
        self.validators.iter().any(|v| &v.address == address)
    }

    /// Get number of validators
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Get all validators
    pub fn validators(&self) -> &[ActiveValidator] {
        &self.validators
    }

    /// Number of validators whose headers count as votes
    pub fn participants_count(&self) -> usize {
        self.validators
            .iter()
            .filter(|v| v.is_consensus_participant)
            .count()
    }
}

impl ValidatorProvider for ValidatorSet {
    fn validators_at(&self, _height: u32) -> BftResult<Vec<ActiveValidator>> {
        Ok(self.validators.clone())
    }
}

use {
    rand::{rngs::StdRng, RngCore, SeedableRng},
    std::fmt::{Debug, Display, Formatter, Result as FmtResult},
};

/// The length of identifiers.
pub const ID_LENGTH: usize = 16;

/// Lucene identifiers.
///
/// Readers and writers are stamped with a random id so that caches and diagnostics can key on the
/// identity of a point-in-time view rather than on its address.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Id {
    id: [u8; ID_LENGTH],
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(f, "Id({self})")
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        for b in self.id {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl Id {
    /// Generate a new random id.
    ///
    /// Ids only need to be unique among the readers and writers alive in one process; an entropy-seeded
    /// [StdRng] makes collisions practically impossible.
    pub fn random_id() -> Self {
        let mut rng = StdRng::from_entropy();
        let mut id = [0u8; ID_LENGTH];
        rng.fill_bytes(&mut id);
        Self::from_bytes(id)
    }

    /// Wraps raw id bytes.
    #[inline]
    pub const fn from_bytes(id: [u8; ID_LENGTH]) -> Self {
        Self {
            id,
        }
    }

    /// Returns the raw bytes of this id.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; ID_LENGTH] {
        &self.id
    }
}

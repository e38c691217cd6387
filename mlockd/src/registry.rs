//! Resource registry: one record per input file.
//!
//! Records are only ever appended. Capacity follows an explicit doubling
//! policy with a floor of [`REGISTRY_INITIAL_CAPACITY`], tracked separately
//! from the `Vec`'s own growth so that it stays observable.

use crate::error::RegistryError;
use std::fmt;

/// Capacity allocated on first use of an empty registry.
pub const REGISTRY_INITIAL_CAPACITY: usize = 1024;

/// Acquisition state of one file.
///
/// `pinned` implies `mapped`, and an unmapped record has no mapping and a
/// zero length.
pub struct ResourceRecord<R> {
    pub(crate) mapping: Option<R>,
    pub(crate) length: usize,
    pub(crate) mapped: bool,
    pub(crate) pinned: bool,
}

impl<R> ResourceRecord<R> {
    fn empty() -> Self {
        Self {
            mapping: None,
            length: 0,
            mapped: false,
            pinned: false,
        }
    }

    /// Mapped region, if the mapping step succeeded and has not been released.
    pub fn mapping(&self) -> Option<&R> {
        self.mapping.as_ref()
    }

    /// Mapped length in bytes; zero if never mapped.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Whether the mapping step succeeded.
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    /// Whether the pin step succeeded.
    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub(crate) fn set_mapped(&mut self, region: R, length: usize) {
        self.mapping = Some(region);
        self.length = length;
        self.mapped = true;
    }

    pub(crate) fn set_pinned(&mut self) {
        debug_assert!(self.mapped, "pinning an unmapped record");
        self.pinned = true;
    }

    /// Back to the empty state, handing out the mapping for release.
    pub(crate) fn reset(&mut self) -> Option<R> {
        self.length = 0;
        self.mapped = false;
        self.pinned = false;
        self.mapping.take()
    }
}

impl<R> fmt::Debug for ResourceRecord<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRecord")
            .field("has_mapping", &self.mapping.is_some())
            .field("length", &self.length)
            .field("mapped", &self.mapped)
            .field("pinned", &self.pinned)
            .finish()
    }
}

/// Ordered, append-only collection of [`ResourceRecord`]s.
///
/// When growth fails the registry is reset to empty, but records acquired
/// before the failure are set aside rather than dropped: they still hold
/// live mappings that only the unwind pass may release.
#[derive(Debug)]
pub struct ResourceRegistry<R> {
    records: Vec<ResourceRecord<R>>,
    stranded: Vec<ResourceRecord<R>>,
    capacity: usize,
    limit: usize,
    growth_events: usize,
}

impl<R> Default for ResourceRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> ResourceRegistry<R> {
    /// Empty registry with zero capacity; the first slot allocates the floor.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            stranded: Vec::new(),
            capacity: 0,
            limit: usize::MAX,
            growth_events: 0,
        }
    }

    /// Cap the number of records; growth past `limit` fails like an
    /// allocation failure.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Registry pre-sized for `capacity` records.
    ///
    /// # Errors
    /// Returns `RegistryError::Allocation` if the storage cannot be reserved.
    pub fn with_capacity(capacity: usize) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry
            .records
            .try_reserve_exact(capacity)
            .map_err(|source| RegistryError::Allocation {
                requested: capacity,
                source,
            })?;
        registry.capacity = capacity;
        Ok(registry)
    }

    /// Make room for one more record.
    ///
    /// When full, doubles the capacity (or sets it to the floor if zero),
    /// never past the record limit. On failure the registry is reset to
    /// empty with zero capacity and the caller must treat the error as
    /// fatal.
    pub fn ensure_capacity(&mut self) -> Result<(), RegistryError> {
        if self.records.len() < self.capacity {
            return Ok(());
        }

        if self.records.len() >= self.limit {
            let limit = self.limit;
            self.reset_storage();
            return Err(RegistryError::Limit { limit });
        }

        let target = if self.capacity == 0 {
            REGISTRY_INITIAL_CAPACITY
        } else {
            self.capacity.saturating_mul(2)
        }
        .min(self.limit);

        if let Err(source) = self.records.try_reserve_exact(target - self.records.len()) {
            self.reset_storage();
            return Err(RegistryError::Allocation {
                requested: target,
                source,
            });
        }

        if self.capacity != 0 {
            self.growth_events += 1;
        }
        tracing::debug!("registry capacity {} -> {}", self.capacity, target);
        self.capacity = target;
        Ok(())
    }

    fn reset_storage(&mut self) {
        let records = std::mem::take(&mut self.records);
        self.stranded.extend(records);
        self.capacity = 0;
    }

    /// Append a fresh empty record and return its index and a handle to it.
    ///
    /// This is the only way records are created.
    pub fn allocate_slot(&mut self) -> Result<(usize, &mut ResourceRecord<R>), RegistryError> {
        self.ensure_capacity()?;
        let index = self.records.len();
        self.records.push(ResourceRecord::empty());
        Ok((index, &mut self.records[index]))
    }

    /// Number of allocated records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record was allocated.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Current capacity under the doubling policy.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of doublings performed; the initial floor allocation is not counted.
    pub fn growth_events(&self) -> usize {
        self.growth_events
    }

    /// Record at `index`.
    pub fn get(&self, index: usize) -> Option<&ResourceRecord<R>> {
        self.records.get(index)
    }

    /// Records in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceRecord<R>> {
        self.records.iter()
    }

    /// Records still holding resources after a failed growth.
    pub fn stranded(&self) -> impl Iterator<Item = &ResourceRecord<R>> {
        self.stranded.iter()
    }

    /// Every record to release: stranded ones first, then live ones, each
    /// group in allocation order.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut ResourceRecord<R>> {
        self.stranded.iter_mut().chain(self.records.iter_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(registry: &mut ResourceRegistry<Vec<u8>>, index: usize) {
        let (slot, record) = registry.allocate_slot().unwrap();
        assert_eq!(slot, index);
        let bytes = (index as u32).to_le_bytes().to_vec();
        record.set_mapped(bytes, index + 1);
        if index % 2 == 0 {
            record.set_pinned();
        }
    }

    fn assert_unchanged(registry: &ResourceRegistry<Vec<u8>>, upto: usize) {
        for index in 0..upto {
            let record = registry.get(index).unwrap();
            assert_eq!(
                record.mapping().unwrap().as_slice(),
                (index as u32).to_le_bytes()
            );
            assert_eq!(record.length(), index + 1);
            assert!(record.is_mapped());
            assert_eq!(record.is_pinned(), index % 2 == 0);
        }
    }

    #[test]
    fn new_registry_is_empty() {
        let registry: ResourceRegistry<Vec<u8>> = ResourceRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.capacity(), 0);
        assert_eq!(registry.growth_events(), 0);
    }

    #[test]
    fn first_slot_allocates_floor() {
        let mut registry: ResourceRegistry<Vec<u8>> = ResourceRegistry::new();
        let (index, record) = registry.allocate_slot().unwrap();
        assert_eq!(index, 0);
        assert!(!record.is_mapped());
        assert!(!record.is_pinned());
        assert_eq!(record.length(), 0);
        assert!(record.mapping().is_none());
        assert_eq!(registry.capacity(), REGISTRY_INITIAL_CAPACITY);
        assert_eq!(registry.growth_events(), 0);
    }

    #[test]
    fn growth_doubles_and_preserves_records() {
        let mut registry = ResourceRegistry::new();

        for index in 0..REGISTRY_INITIAL_CAPACITY {
            fill(&mut registry, index);
        }
        assert_eq!(registry.capacity(), 1024);
        assert_eq!(registry.growth_events(), 0);

        fill(&mut registry, 1024);
        assert_eq!(registry.capacity(), 2048);
        assert_eq!(registry.growth_events(), 1);
        assert_unchanged(&registry, 1024);

        for index in 1025..2048 {
            fill(&mut registry, index);
        }
        fill(&mut registry, 2048);
        assert_eq!(registry.len(), 2049);
        assert_eq!(registry.capacity(), 4096);
        assert_eq!(registry.growth_events(), 2);
        assert_unchanged(&registry, 2048);
    }

    #[test]
    fn presized_registry_doubles_from_its_size() {
        let mut registry: ResourceRegistry<Vec<u8>> = ResourceRegistry::with_capacity(3).unwrap();
        assert_eq!(registry.capacity(), 3);
        for _ in 0..4 {
            registry.allocate_slot().unwrap();
        }
        assert_eq!(registry.capacity(), 6);
        assert_eq!(registry.growth_events(), 1);
    }

    #[test]
    fn impossible_presize_is_allocation_error() {
        let result: Result<ResourceRegistry<Vec<u8>>, _> = ResourceRegistry::with_capacity(usize::MAX);
        assert!(matches!(result, Err(RegistryError::Allocation { .. })));
    }

    #[test]
    fn limit_caps_growth() {
        let mut registry: ResourceRegistry<Vec<u8>> = ResourceRegistry::new().with_limit(3);
        registry.allocate_slot().unwrap();
        assert_eq!(registry.capacity(), 3);
        registry.allocate_slot().unwrap();
        registry.allocate_slot().unwrap();
        assert_eq!(registry.growth_events(), 0);
    }

    #[test]
    fn failed_growth_resets_and_strands_records() {
        let mut registry = ResourceRegistry::with_capacity(2).unwrap().with_limit(2);
        fill(&mut registry, 0);
        fill(&mut registry, 1);

        let err = registry.allocate_slot().unwrap_err();
        assert!(matches!(err, RegistryError::Limit { limit: 2 }));
        assert!(registry.is_empty());
        assert_eq!(registry.capacity(), 0);
        assert!(registry.get(0).is_none());

        let stranded: Vec<_> = registry.stranded().collect();
        assert_eq!(stranded.len(), 2);
        assert_eq!(stranded[1].mapping().unwrap().as_slice(), 1u32.to_le_bytes());
        assert_eq!(registry.iter_mut().count(), 2);
    }

    #[test]
    fn reset_releases_mapping() {
        let mut registry = ResourceRegistry::new();
        fill(&mut registry, 0);
        let (_, record) = registry.allocate_slot().unwrap();
        record.set_mapped(vec![1, 2, 3], 3);
        record.set_pinned();

        let region = record.reset();
        assert_eq!(region, Some(vec![1, 2, 3]));
        assert!(!record.is_mapped());
        assert!(!record.is_pinned());
        assert_eq!(record.length(), 0);
        assert!(record.mapping().is_none());
    }
}

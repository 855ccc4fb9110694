//! Shared fixtures for the integration suites: a small cat-registry
//! schema mapped by hand, plus instrumented backend wrappers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bson::Bson;

use entitylayer::memory::MemoryBackend;
use entitylayer::prelude::*;

entitylayer::string_enum! {
    pub enum Country {
        UnitedStates => "unitedStates",
        Thailand => "thailand",
        Norway => "norway",
    }
}

// ---------------------------------------------------------------------------
// Breed
// ---------------------------------------------------------------------------

pub struct Breed {
    pub id: ObjectId,
    pub name: String,
    pub country: Country,
    pub motto: Option<String>,
}

impl Breed {
    pub const NAME: Key<String> = Key::new("name");
    pub const COUNTRY: Key<Country> = Key::new("country");
    pub const MOTTO: Key<String> = Key::new("motto");

    pub fn new(name: &str, country: Country) -> Self {
        Breed {
            id: ObjectId::new(),
            name: name.to_string(),
            country,
            motto: None,
        }
    }
}

pub struct BreedValues {
    pub name: Option<String>,
    pub country: Option<Country>,
    pub motto: Option<String>,
}

impl ModelValues for BreedValues {
    fn deserialize(document: &Document) -> MappingResult<Self> {
        let reader = DocumentReader::new(document);

        Ok(BreedValues {
            name: reader.read_optional(&Breed::NAME)?,
            country: reader.read_optional(&Breed::COUNTRY)?,
            motto: reader.read_optional(&Breed::MOTTO)?,
        })
    }
}

pub struct BreedFields {
    path: KeyPath,
}

impl BreedFields {
    pub fn name(&self) -> Key<String> {
        self.path.key("name")
    }

    pub fn country(&self) -> Key<Country> {
        self.path.key("country")
    }

    pub fn motto(&self) -> Key<String> {
        self.path.key("motto")
    }
}

impl ModelFields for BreedFields {
    fn scoped(path: KeyPath) -> Self {
        BreedFields { path }
    }
}

impl Model for Breed {
    type Values = BreedValues;
    type Fields = BreedFields;

    fn collection_name() -> &'static str {
        "breeds"
    }

    fn id(&self) -> ObjectId {
        self.id
    }

    fn serialize(&self) -> Document {
        let mut writer = DocumentWriter::new();
        writer
            .write(&Self::NAME, &self.name)
            .write(&Self::COUNTRY, &self.country)
            .write_optional(&Self::MOTTO, self.motto.as_ref());

        writer.finish()
    }

    fn deserialize(document: &Document) -> MappingResult<Self> {
        let reader = DocumentReader::new(document);

        Ok(Breed {
            id: reader.read(&IDENTITY_KEY)?,
            name: reader.read(&Self::NAME)?,
            country: reader.read(&Self::COUNTRY)?,
            motto: reader.read_optional(&Self::MOTTO)?,
        })
    }

    fn apply(&mut self, values: Self::Values) {
        if let Some(name) = values.name {
            self.name = name;
        }
        if let Some(country) = values.country {
            self.country = country;
        }
        if let Some(motto) = values.motto {
            self.motto = Some(motto);
        }
    }
}

// ---------------------------------------------------------------------------
// Profile (a nested composite value, inlined as a sub-document)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub city: String,
    pub indoor: bool,
}

impl Profile {
    pub const CITY: Key<String> = Key::new("city");
    pub const INDOOR: Key<bool> = Key::new("indoor");
}

impl Primitive for Profile {
    fn to_primitive(&self) -> Bson {
        let mut writer = DocumentWriter::new();
        writer
            .write(&Self::CITY, &self.city)
            .write(&Self::INDOOR, &self.indoor);

        Bson::Document(writer.finish())
    }

    fn from_primitive(value: Bson) -> MappingResult<Self> {
        let doc = Document::from_primitive(value)?;
        let reader = DocumentReader::new(&doc);

        Ok(Profile {
            city: reader.read(&Self::CITY)?,
            indoor: reader.read(&Self::INDOOR)?,
        })
    }
}

pub struct ProfileFields {
    path: KeyPath,
}

impl ProfileFields {
    pub fn city(&self) -> Key<String> {
        self.path.key("city")
    }

    pub fn indoor(&self) -> Key<bool> {
        self.path.key("indoor")
    }
}

impl ModelFields for ProfileFields {
    fn scoped(path: KeyPath) -> Self {
        ProfileFields { path }
    }
}

// ---------------------------------------------------------------------------
// Cat
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Cat {
    pub id: ObjectId,
    pub name: String,
    pub age: i64,
    pub breed: Reference<Breed>,
    pub profile: Profile,
    pub nicknames: Vec<String>,
}

impl Cat {
    pub const NAME: Key<String> = Key::new("name");
    pub const AGE: Key<i64> = Key::new("age");
    pub const BREED: Key<Reference<Breed>> = Key::new("breed");
    pub const PROFILE: Key<Profile> = Key::new("profile");
    pub const NICKNAMES: Key<Vec<String>> = Key::new("nicknames");

    pub fn new(name: &str, age: i64, breed: &Entity<Breed>) -> Self {
        Cat {
            id: ObjectId::new(),
            name: name.to_string(),
            age,
            breed: Reference::to(breed),
            profile: Profile { city: "Bangkok".to_string(), indoor: true },
            nicknames: Vec::new(),
        }
    }
}

pub struct CatValues {
    pub name: Option<String>,
    pub age: Option<i64>,
    pub breed: Option<Reference<Breed>>,
    pub profile: Option<Profile>,
    pub nicknames: Option<Vec<String>>,
}

impl ModelValues for CatValues {
    fn deserialize(document: &Document) -> MappingResult<Self> {
        let reader = DocumentReader::new(document);

        Ok(CatValues {
            name: reader.read_optional(&Cat::NAME)?,
            age: reader.read_optional(&Cat::AGE)?,
            breed: reader.read_optional(&Cat::BREED)?,
            profile: reader.read_optional(&Cat::PROFILE)?,
            nicknames: reader.read_optional(&Cat::NICKNAMES)?,
        })
    }
}

pub struct CatFields {
    path: KeyPath,
}

impl CatFields {
    pub fn name(&self) -> Key<String> {
        self.path.key("name")
    }

    pub fn age(&self) -> Key<i64> {
        self.path.key("age")
    }

    pub fn breed(&self) -> Key<Reference<Breed>> {
        self.path.key("breed")
    }

    pub fn profile(&self) -> ProfileFields {
        ProfileFields::scoped(self.path.child("profile"))
    }

    pub fn nicknames(&self) -> Key<Vec<String>> {
        self.path.key("nicknames")
    }
}

impl ModelFields for CatFields {
    fn scoped(path: KeyPath) -> Self {
        CatFields { path }
    }
}

impl Model for Cat {
    type Values = CatValues;
    type Fields = CatFields;

    fn collection_name() -> &'static str {
        "cats"
    }

    fn id(&self) -> ObjectId {
        self.id
    }

    fn serialize(&self) -> Document {
        let mut writer = DocumentWriter::new();
        writer
            .write(&Self::NAME, &self.name)
            .write(&Self::AGE, &self.age)
            .write(&Self::BREED, &self.breed)
            .write(&Self::PROFILE, &self.profile)
            .write(&Self::NICKNAMES, &self.nicknames);

        writer.finish()
    }

    fn deserialize(document: &Document) -> MappingResult<Self> {
        let reader = DocumentReader::new(document);

        Ok(Cat {
            id: reader.read(&IDENTITY_KEY)?,
            name: reader.read(&Self::NAME)?,
            age: reader.read(&Self::AGE)?,
            breed: reader.read(&Self::BREED)?,
            profile: reader.read(&Self::PROFILE)?,
            nicknames: reader.read_optional(&Self::NICKNAMES)?.unwrap_or_default(),
        })
    }

    fn apply(&mut self, values: Self::Values) {
        if let Some(name) = values.name {
            self.name = name;
        }
        if let Some(age) = values.age {
            self.age = age;
        }
        if let Some(breed) = values.breed {
            self.breed = breed;
        }
        if let Some(profile) = values.profile {
            self.profile = profile;
        }
        if let Some(nicknames) = values.nicknames {
            self.nicknames = nicknames;
        }
    }
}

// ---------------------------------------------------------------------------
// Instrumented backend wrappers
// ---------------------------------------------------------------------------

/// Delegates to a [`MemoryBackend`] while counting the writes issued,
/// so tests can observe whether a save actually reached storage.
#[derive(Debug, Default)]
pub struct CountingBackend {
    inner: MemoryBackend,
    writes: AtomicU64,
}

impl CountingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of update/replace calls issued so far.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CollectionBackend for CountingBackend {
    async fn insert(&self, collection: &str, document: Document) -> MappingResult<()> {
        self.inner.insert(collection, document).await
    }

    async fn find_one(&self, collection: &str, query: Query) -> MappingResult<Option<Document>> {
        self.inner.find_one(collection, query).await
    }

    async fn find(&self, collection: &str, query: Query) -> MappingResult<DocumentStream> {
        self.inner.find(collection, query).await
    }

    async fn count(&self, collection: &str, query: Query) -> MappingResult<u64> {
        self.inner.count(collection, query).await
    }

    async fn update(
        &self,
        collection: &str,
        query: Query,
        replacement: Document,
        upsert: bool,
    ) -> MappingResult<UpdateOutcome> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner
            .update(collection, query, replacement, upsert)
            .await
    }

    async fn remove(&self, collection: &str, query: Query) -> MappingResult<RemoveOutcome> {
        self.inner.remove(collection, query).await
    }
}

/// Delegates to a [`MemoryBackend`] but fails every removal keyed to one
/// designated identity, for exercising partial bulk-remove failures.
#[derive(Debug)]
pub struct FailingRemoveBackend {
    inner: MemoryBackend,
    poisoned: ObjectId,
}

impl FailingRemoveBackend {
    pub fn new(poisoned: ObjectId) -> Self {
        Self { inner: MemoryBackend::new(), poisoned }
    }

    fn targets_poisoned(&self, query: &Query) -> bool {
        matches!(
            &query.filter,
            Some(Expr::Field { value: Bson::ObjectId(id), .. }) if *id == self.poisoned
        )
    }
}

#[async_trait]
impl CollectionBackend for FailingRemoveBackend {
    async fn insert(&self, collection: &str, document: Document) -> MappingResult<()> {
        self.inner.insert(collection, document).await
    }

    async fn find_one(&self, collection: &str, query: Query) -> MappingResult<Option<Document>> {
        self.inner.find_one(collection, query).await
    }

    async fn find(&self, collection: &str, query: Query) -> MappingResult<DocumentStream> {
        self.inner.find(collection, query).await
    }

    async fn count(&self, collection: &str, query: Query) -> MappingResult<u64> {
        self.inner.count(collection, query).await
    }

    async fn update(
        &self,
        collection: &str,
        query: Query,
        replacement: Document,
        upsert: bool,
    ) -> MappingResult<UpdateOutcome> {
        self.inner
            .update(collection, query, replacement, upsert)
            .await
    }

    async fn remove(&self, collection: &str, query: Query) -> MappingResult<RemoveOutcome> {
        if self.targets_poisoned(&query) {
            return Err(MappingError::Backend("simulated removal failure".to_string()));
        }

        self.inner.remove(collection, query).await
    }
}

//! Typed query construction driven end-to-end through the memory backend.

mod common;

use futures::TryStreamExt;

use entitylayer::memory::MemoryBackend;
use entitylayer::prelude::*;

use common::{Breed, Cat, CatFields, Country};

async fn seeded_context() -> Context<MemoryBackend> {
    let context = Context::new(MemoryBackend::new());
    let breeds = context.collection::<Breed>();

    for (name, country) in [
        ("Siamese", Country::UnitedStates),
        ("Maine Coon", Country::UnitedStates),
        ("Korat", Country::Thailand),
    ] {
        breeds
            .save(&Entity::new(Breed::new(name, country)))
            .await
            .unwrap();
    }

    context
}

#[tokio::test]
async fn enum_fields_match_on_their_wire_tag() {
    let context = seeded_context().await;
    let breeds = context.collection::<Breed>();

    let american = breeds
        .count_with(|breed| breed.country().eq(Country::UnitedStates))
        .await
        .unwrap();
    assert_eq!(american, 2);

    let thai = breeds
        .find_one_with(|breed| breed.country().eq(Country::Thailand))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(thai.read().await.name, "Korat");
}

#[tokio::test]
async fn string_prefix_matching_is_available_on_string_fields() {
    let context = seeded_context().await;
    let breeds = context.collection::<Breed>();

    let matches: Vec<_> = breeds
        .find_with(|breed| breed.name().starts_with("Ma"))
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].read().await.name, "Maine Coon");
}

#[tokio::test]
async fn combinators_compose_typed_comparisons() {
    let context = seeded_context().await;
    let breeds = context.collection::<Breed>();

    let count = breeds
        .count_with(|breed| {
            breed
                .country()
                .eq(Country::UnitedStates)
                .and(breed.name().ne("Siamese"))
        })
        .await
        .unwrap();
    assert_eq!(count, 1);

    let either = breeds
        .count_with(|breed| {
            breed
                .name()
                .eq("Siamese")
                .or(breed.name().eq("Korat"))
        })
        .await
        .unwrap();
    assert_eq!(either, 2);
}

#[tokio::test]
async fn nested_composite_fields_query_through_dotted_paths() {
    let context = seeded_context().await;
    let breeds = context.collection::<Breed>();
    let cats = context.collection::<Cat>();

    let breed = breeds
        .find_one_with(|breed| breed.name().eq("Siamese"))
        .await
        .unwrap()
        .unwrap();

    let mut garfield = Cat::new("Garfield", 5, &breed);
    garfield.profile.city = "Muncie".to_string();
    cats.save(&Entity::new(garfield)).await.unwrap();
    cats.save(&Entity::new(Cat::new("Mia", 2, &breed)))
        .await
        .unwrap();

    let in_muncie = cats
        .find_one_with(|cat| cat.profile().city().eq("Muncie"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(in_muncie.read().await.name, "Garfield");

    let indoor = cats
        .count_with(|cat| cat.profile().indoor().eq(true))
        .await
        .unwrap();
    assert_eq!(indoor, 2);
}

#[tokio::test]
async fn range_operators_and_result_shaping_compose() {
    let context = seeded_context().await;
    let breeds = context.collection::<Breed>();
    let cats = context.collection::<Cat>();

    let breed = breeds
        .find_one_with(|breed| breed.name().eq("Korat"))
        .await
        .unwrap()
        .unwrap();
    for (name, age) in [("Mia", 2), ("Leo", 7), ("Nox", 4)] {
        cats.save(&Entity::new(Cat::new(name, age, &breed)))
            .await
            .unwrap();
    }

    let adults = cats
        .count_with(|cat| cat.age().gte(4))
        .await
        .unwrap();
    assert_eq!(adults, 2);

    let fields = CatFields::root();
    let oldest_first = Query::builder()
        .filter(fields.age().gt(0))
        .sort(&fields.age(), SortDirection::Desc)
        .limit(2)
        .build();

    let names: Vec<String> = {
        let entities: Vec<_> = cats
            .find(oldest_first)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        let mut names = Vec::new();
        for entity in &entities {
            names.push(entity.read().await.name.clone());
        }
        names
    };

    assert_eq!(names, vec!["Leo".to_string(), "Nox".to_string()]);
}

#[tokio::test]
async fn sequence_fields_match_on_contained_elements() {
    let context = seeded_context().await;
    let breeds = context.collection::<Breed>();
    let cats = context.collection::<Cat>();

    let breed = breeds
        .find_one_with(|breed| breed.name().eq("Siamese"))
        .await
        .unwrap()
        .unwrap();

    let mut cat = Cat::new("Mia", 2, &breed);
    cat.nicknames = vec!["shadow".to_string(), "bean".to_string()];
    cats.save(&Entity::new(cat)).await.unwrap();

    let hit = cats
        .find_one_with(|cat| cat.nicknames().contains_element("bean"))
        .await
        .unwrap();
    assert!(hit.is_some());

    let miss = cats
        .find_one_with(|cat| cat.nicknames().contains_element("ghost"))
        .await
        .unwrap();
    assert!(miss.is_none());
}

//! Integration tests for quarry-orm
//!
//! These tests run mappers against the in-memory data source with a small
//! blog schema: authors, articles, comments, tags and profiles.

use quarry_domain::{
    shared, Criteria, Direction, Entity, EntityError, EntityHandle, FromValue, QueryObject,
    QueryOptions, Related, Row, SharedDataSource, Value,
};
use quarry_orm::{
    Association, DataMapper, EntityOptions, FieldList, Hooks, ListFields, Mapped, Mapper,
    MapperError, MapperManager, MapperSchema, ObjectRelationalMapper, Repository,
};
use quarry_store::{FixtureSet, MemoryDataSource};
use std::cell::RefCell;
use std::rc::Rc;

fn typed<T: FromValue>(field: &str, value: Value) -> Result<T, EntityError> {
    value
        .into_typed()
        .map_err(|e| EntityError::invalid_value(field, e))
}

#[derive(Debug, Clone, Default)]
struct Author {
    handle: EntityHandle,
    id: Option<i64>,
    name: Option<String>,
    articles: Vec<Article>,
    profile: Option<Profile>,
}

impl Entity for Author {
    fn handle(&self) -> &EntityHandle {
        &self.handle
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => self.id.map(Value::from),
            "name" => self.name.clone().map(Value::from),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), EntityError> {
        match name {
            "id" => self.id = typed(name, value)?,
            "name" => self.name = typed(name, value)?,
            _ => return Err(EntityError::UnknownField(name.to_string())),
        }
        Ok(())
    }

    fn set_related(&mut self, property: &str, related: Related) -> Result<(), EntityError> {
        match property {
            "articles" => self.articles = related.into_many(property)?,
            "profile" => self.profile = related.into_one(property)?,
            _ => return Err(EntityError::UnknownProperty(property.to_string())),
        }
        Ok(())
    }
}

impl Mapped for Author {
    fn schema() -> MapperSchema {
        MapperSchema::new("authors").with_fields(["id", "name"])
    }

    fn associations() -> Vec<Association> {
        vec![
            Association::has_many("articles")
                .class::<Article>()
                .foreign_key("author_id"),
            Association::has_one("profile")
                .class::<Profile>()
                .foreign_key("author_id")
                .dependent(true),
        ]
    }
}

#[derive(Debug, Clone, Default)]
struct Article {
    handle: EntityHandle,
    id: Option<i64>,
    title: Option<String>,
    author_id: Option<i64>,
    author: Option<Author>,
    comments: Vec<Comment>,
    tags: Vec<Tag>,
}

impl Entity for Article {
    fn handle(&self) -> &EntityHandle {
        &self.handle
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => self.id.map(Value::from),
            "title" => self.title.clone().map(Value::from),
            "author_id" => self.author_id.map(Value::from),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), EntityError> {
        match name {
            "id" => self.id = typed(name, value)?,
            "title" => self.title = typed(name, value)?,
            "author_id" => self.author_id = typed(name, value)?,
            _ => return Err(EntityError::UnknownField(name.to_string())),
        }
        Ok(())
    }

    fn set_related(&mut self, property: &str, related: Related) -> Result<(), EntityError> {
        match property {
            "author" => self.author = related.into_one(property)?,
            "comments" => self.comments = related.into_many(property)?,
            "tags" => self.tags = related.into_many(property)?,
            _ => return Err(EntityError::UnknownProperty(property.to_string())),
        }
        Ok(())
    }
}

impl Mapped for Article {
    fn schema() -> MapperSchema {
        MapperSchema::new("articles").with_fields(["id", "title", "author_id"])
    }

    fn associations() -> Vec<Association> {
        vec![
            Association::belongs_to_many("tags")
                .class::<Tag>()
                .join_table("articles_tags")
                .foreign_key("article_id")
                .other_foreign_key("tag_id")
                .dependent(true),
            Association::has_many("comments")
                .class::<Comment>()
                .foreign_key("article_id")
                .order("id", Direction::Desc)
                .dependent(true),
            Association::belongs_to("author")
                .class::<Author>()
                .foreign_key("author_id"),
        ]
    }
}

#[derive(Debug, Clone, Default)]
struct Comment {
    handle: EntityHandle,
    id: Option<i64>,
    article_id: Option<i64>,
    body: Option<String>,
}

impl Entity for Comment {
    fn handle(&self) -> &EntityHandle {
        &self.handle
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => self.id.map(Value::from),
            "article_id" => self.article_id.map(Value::from),
            "body" => self.body.clone().map(Value::from),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), EntityError> {
        match name {
            "id" => self.id = typed(name, value)?,
            "article_id" => self.article_id = typed(name, value)?,
            "body" => self.body = typed(name, value)?,
            _ => return Err(EntityError::UnknownField(name.to_string())),
        }
        Ok(())
    }
}

impl Mapped for Comment {
    fn schema() -> MapperSchema {
        MapperSchema::new("comments").with_fields(["id", "article_id", "body"])
    }
}

#[derive(Debug, Clone, Default)]
struct Tag {
    handle: EntityHandle,
    id: Option<i64>,
    name: Option<String>,
}

impl Entity for Tag {
    fn handle(&self) -> &EntityHandle {
        &self.handle
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => self.id.map(Value::from),
            "name" => self.name.clone().map(Value::from),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), EntityError> {
        match name {
            "id" => self.id = typed(name, value)?,
            "name" => self.name = typed(name, value)?,
            _ => return Err(EntityError::UnknownField(name.to_string())),
        }
        Ok(())
    }
}

impl Mapped for Tag {
    fn schema() -> MapperSchema {
        MapperSchema::new("tags").with_fields(["id", "name"])
    }
}

#[derive(Debug, Clone, Default)]
struct Profile {
    handle: EntityHandle,
    id: Option<i64>,
    author_id: Option<i64>,
    bio: Option<String>,
}

impl Entity for Profile {
    fn handle(&self) -> &EntityHandle {
        &self.handle
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => self.id.map(Value::from),
            "author_id" => self.author_id.map(Value::from),
            "bio" => self.bio.clone().map(Value::from),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), EntityError> {
        match name {
            "id" => self.id = typed(name, value)?,
            "author_id" => self.author_id = typed(name, value)?,
            "bio" => self.bio = typed(name, value)?,
            _ => return Err(EntityError::UnknownField(name.to_string())),
        }
        Ok(())
    }
}

impl Mapped for Profile {
    fn schema() -> MapperSchema {
        MapperSchema::new("profiles").with_fields(["id", "author_id", "bio"])
    }
}

fn row<const N: usize>(pairs: [(&str, Value); N]) -> Row {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Keyed by article and locale rather than by its own id
#[derive(Debug, Clone, Default)]
struct Translation {
    handle: EntityHandle,
    id: Option<i64>,
    article_id: Option<i64>,
    locale: Option<String>,
    title: Option<String>,
}

impl Entity for Translation {
    fn handle(&self) -> &EntityHandle {
        &self.handle
    }

    fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => self.id.map(Value::from),
            "article_id" => self.article_id.map(Value::from),
            "locale" => self.locale.clone().map(Value::from),
            "title" => self.title.clone().map(Value::from),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: Value) -> Result<(), EntityError> {
        match name {
            "id" => self.id = typed(name, value)?,
            "article_id" => self.article_id = typed(name, value)?,
            "locale" => self.locale = typed(name, value)?,
            "title" => self.title = typed(name, value)?,
            _ => return Err(EntityError::UnknownField(name.to_string())),
        }
        Ok(())
    }
}

fn translation(locale: &str, title: &str) -> Translation {
    Translation {
        article_id: Some(1000),
        locale: Some(locale.to_string()),
        title: Some(title.to_string()),
        ..Translation::default()
    }
}

fn fixtures() -> FixtureSet {
    FixtureSet::new()
        .with_rows(
            "authors",
            vec![
                row([("id", 2000.into()), ("name", "Jon".into())]),
                row([("id", 2001.into()), ("name", "Tony".into())]),
            ],
        )
        .with_rows(
            "articles",
            vec![
                row([("id", 1000.into()), ("title", "Article #1".into()), ("author_id", 2000.into())]),
                row([("id", 1001.into()), ("title", "Article #2".into()), ("author_id", 2000.into())]),
                row([("id", 1002.into()), ("title", "Article #3".into()), ("author_id", 2001.into())]),
            ],
        )
        .with_rows(
            "comments",
            vec![
                row([("id", 5000.into()), ("article_id", 1000.into()), ("body", "First".into())]),
                row([("id", 5001.into()), ("article_id", 1000.into()), ("body", "Second".into())]),
                row([("id", 5002.into()), ("article_id", 1001.into()), ("body", "Third".into())]),
            ],
        )
        .with_rows(
            "tags",
            vec![
                row([("id", 3000.into()), ("name", "Tag #1".into())]),
                row([("id", 3001.into()), ("name", "Tag #2".into())]),
                row([("id", 3002.into()), ("name", "Tag #3".into())]),
            ],
        )
        .with_rows(
            "articles_tags",
            vec![
                row([("id", 1.into()), ("article_id", 1000.into()), ("tag_id", 3000.into())]),
                row([("id", 2.into()), ("article_id", 1000.into()), ("tag_id", 3001.into())]),
                row([("id", 3.into()), ("article_id", 1001.into()), ("tag_id", 3001.into())]),
            ],
        )
        .with_rows(
            "profiles",
            vec![row([("id", 6000.into()), ("author_id", 2000.into()), ("bio", "Writer".into())])],
        )
}

fn data_source() -> SharedDataSource {
    let mut store = MemoryDataSource::new();
    store.load_fixtures(fixtures());
    shared(store)
}

fn manager() -> Rc<MapperManager> {
    MapperManager::new(data_source())
}

fn count(data_source: &SharedDataSource, collection: &str, criteria: Criteria) -> usize {
    data_source
        .borrow()
        .count(collection, &QueryObject::with_criteria(criteria))
        .unwrap()
}

fn with(properties: &[&str]) -> QueryOptions {
    QueryOptions::new().with(properties.iter().copied())
}

#[test]
fn test_get_and_not_found() -> anyhow::Result<()> {
    let manager = manager();
    let articles = manager.get::<Article>()?;

    let article = articles.get_by(Criteria::new().and("id", 1000), QueryOptions::new())?;
    assert_eq!(article.title.as_deref(), Some("Article #1"));
    assert!(articles.is_persisted(&article));

    let missing = articles.get_by(Criteria::new().and("id", 9999), QueryOptions::new());
    assert!(matches!(missing, Err(MapperError::EntityNotFound)));
    Ok(())
}

#[test]
fn test_finders() -> anyhow::Result<()> {
    let manager = manager();
    let articles = manager.get::<Article>()?;

    assert_eq!(articles.find_all_by(Criteria::new().and("id !=", 1000), QueryOptions::new())?.len(), 2);
    assert_eq!(articles.find_count_by(Criteria::new().and("id", 1000), QueryOptions::new())?, 1);
    assert!(articles.find_by(Criteria::new().and("id", 1), QueryOptions::new())?.is_none());

    let newest = articles.find(&QueryObject::new(
        Criteria::new(),
        QueryOptions::new().order_by("id", Direction::Desc),
    ))?;
    assert_eq!(newest.and_then(|a| a.id), Some(1002));
    Ok(())
}

#[test]
fn test_find_list_shapes() -> anyhow::Result<()> {
    let manager = manager();
    let articles = manager.get::<Article>()?;

    assert_eq!(
        articles.find_list(&QueryObject::default(), &ListFields::new())?,
        FieldList::Values(vec![1000.into(), 1001.into(), 1002.into()])
    );
    assert_eq!(
        articles.find_list_by(Criteria::new().and("id !=", 1001), &ListFields::new(), QueryOptions::new())?,
        FieldList::Values(vec![1000.into(), 1002.into()])
    );

    let FieldList::Map(titles) =
        articles.find_list(&QueryObject::default(), &ListFields::new().value("title"))?
    else {
        panic!("expected a key/value list");
    };
    assert_eq!(titles[&Value::Int(1001)], Value::from("Article #2"));
    Ok(())
}

#[test]
fn test_find_list_grouped() -> anyhow::Result<()> {
    let manager = manager();
    let articles = manager.get::<Article>()?;

    articles.update_all(&QueryObject::default(), row([("author_id", 2000.into())]))?;
    articles.update_all(
        &QueryObject::with_criteria(Criteria::new().and("id !=", 1001)),
        row([("author_id", 4000.into())]),
    )?;

    let list = articles.find_list(
        &QueryObject::default(),
        &ListFields::new().value("title").group("author_id"),
    )?;
    let FieldList::Grouped(groups) = list else {
        panic!("expected a grouped list");
    };

    let keys: Vec<&Value> = groups.keys().collect();
    assert_eq!(keys, vec![&Value::Int(4000), &Value::Int(2000)]);

    let first: Vec<(&Value, &Value)> = groups[&Value::Int(4000)].iter().collect();
    assert_eq!(
        first,
        vec![
            (&Value::Int(1000), &Value::from("Article #1")),
            (&Value::Int(1002), &Value::from("Article #3")),
        ]
    );
    assert_eq!(groups[&Value::Int(2000)][&Value::Int(1001)], Value::from("Article #2"));
    Ok(())
}

#[test]
fn test_save_create_update_delete_lifecycle() -> anyhow::Result<()> {
    let manager = manager();
    let tags = manager.get::<Tag>()?;

    let mut tag = tags.create_entity(row([("name", "rust".into())]), EntityOptions::new())?;
    assert!(!tags.is_persisted(&tag));

    assert!(tags.save(&mut tag)?);
    assert!(tags.is_persisted(&tag));
    let id = tag.id.expect("generated id written back");

    tag.name = Some("rust-lang".to_string());
    assert!(tags.save(&mut tag)?);
    assert_eq!(tags.find_count(&QueryObject::default())?, 4);

    let stored = tags.get_by(Criteria::new().and("id", id), QueryOptions::new())?;
    assert_eq!(stored.name.as_deref(), Some("rust-lang"));

    let copy = tag.clone();
    assert!(tags.delete(&tag)?);
    assert!(!tags.is_persisted(&copy));
    assert!(!tags.delete(&tag)?);
    Ok(())
}

#[test]
fn test_round_trip_and_whitelist() -> anyhow::Result<()> {
    let manager = manager();
    let articles = manager.get::<Article>()?;

    let data = row([
        ("id", 7.into()),
        ("title", "Round trip".into()),
        ("author_id", 2001.into()),
        ("views", 12.into()),
    ]);
    let article = articles.map_data_to_entity(&data)?;
    let mapped = articles.map_entity_to_data(&article);

    assert_eq!(mapped.len(), 3);
    assert!(mapped.keys().all(|k| articles.data_mapper().schema().has_field(k)));
    assert_eq!(mapped["title"], Value::from("Round trip"));
    assert_eq!(articles.map_data_to_entity(&mapped)?.author_id, Some(2001));
    Ok(())
}

#[test]
fn test_hook_order_and_veto() -> anyhow::Result<()> {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let data_source = data_source();
    let manager = MapperManager::new(SharedDataSource::clone(&data_source));

    let mut tags = ObjectRelationalMapper::<Tag>::new(manager.data_source(), &manager)?;
    {
        let hooks: &mut Hooks<Tag> = tags.hooks_mut();
        for event in ["before_save", "before_create"] {
            let calls = Rc::clone(&calls);
            let record = move |_: &mut Tag| {
                calls.borrow_mut().push(event);
                true
            };
            match event {
                "before_save" => hooks.before_save(record),
                _ => hooks.before_create(record),
            };
        }
        let log = Rc::clone(&calls);
        hooks.after_create(move |_| log.borrow_mut().push("after_create"));
        let log = Rc::clone(&calls);
        hooks.after_save(move |_| log.borrow_mut().push("after_save"));
        hooks.before_create(|tag| tag.name.as_deref() != Some("forbidden"));
    }

    let mut tag = Tag {
        name: Some("allowed".to_string()),
        ..Tag::default()
    };
    assert!(tags.save(&mut tag)?);
    assert_eq!(
        *calls.borrow(),
        vec!["before_save", "before_create", "after_create", "after_save"]
    );

    calls.borrow_mut().clear();
    let mut vetoed = Tag {
        name: Some("forbidden".to_string()),
        ..Tag::default()
    };
    assert!(!tags.save(&mut vetoed)?);
    assert_eq!(*calls.borrow(), vec!["before_save", "before_create"]);
    assert!(!tags.is_persisted(&vetoed));
    assert_eq!(count(&data_source, "tags", Criteria::new().and("name", "forbidden")), 0);
    Ok(())
}

#[test]
fn test_before_find_applies_to_counts() -> anyhow::Result<()> {
    let data_source = data_source();
    let manager = MapperManager::new(data_source);
    let seen = Rc::new(RefCell::new(0));

    let seen_by_hook = Rc::clone(&seen);
    manager.configure::<Article, _>(move |data_source, manager| {
        let mut mapper = ObjectRelationalMapper::<Article>::new(data_source, manager)?;
        let seen = Rc::clone(&seen_by_hook);
        mapper.hooks_mut().before_find(move |query| {
            *seen.borrow_mut() += 1;
            let mut criteria = query.criteria().clone();
            criteria.insert("author_id", 2000);
            query.set_criteria(criteria);
            true
        });
        Ok(mapper)
    });

    let articles = manager.get::<Article>()?;
    assert_eq!(articles.find_count(&QueryObject::default())?, 2);
    assert_eq!(articles.find_all(&QueryObject::default())?.len(), 2);
    assert_eq!(*seen.borrow(), 2);
    Ok(())
}

#[test]
fn test_after_find_sees_raw_rows() -> anyhow::Result<()> {
    let manager = manager();
    let mut mapper = ObjectRelationalMapper::<Tag>::new(manager.data_source(), &manager)?;
    mapper.hooks_mut().after_find(|rows, _| {
        for row in rows.iter_mut() {
            row.insert("name".to_string(), Value::from("rewritten"));
        }
    });
    let tags = manager.add(mapper);

    let all = tags.find_all(&QueryObject::default())?;
    assert!(all.iter().all(|t| t.name.as_deref() == Some("rewritten")));
    Ok(())
}

#[test]
fn test_composite_primary_key_lifecycle() -> anyhow::Result<()> {
    let data_source = data_source();
    let translations = DataMapper::<Translation>::new(
        MapperSchema::new("translations")
            .with_primary_key(["article_id", "locale"])
            .with_fields(["id", "article_id", "locale", "title"]),
        SharedDataSource::clone(&data_source),
    )?;

    let mut english = translation("en", "Article #1");
    let mut french = translation("fr", "Article n°1");
    assert!(translations.save(&mut english)?);
    assert!(translations.save(&mut french)?);
    // The store generated an id, but it is not part of the key
    assert_eq!(english.id, None);

    english.title = Some("First article".to_string());
    assert!(translations.save(&mut english)?);
    let by_key = |locale: &str| Criteria::new().and("article_id", 1000).and("locale", locale);
    let stored = translations.get_by(by_key("en"), QueryOptions::new())?;
    assert_eq!(stored.title.as_deref(), Some("First article"));
    let untouched = translations.get_by(by_key("fr"), QueryOptions::new())?;
    assert_eq!(untouched.title.as_deref(), Some("Article n°1"));

    let mut partial = english.clone();
    partial.locale = None;
    assert!(matches!(
        translations.delete(&partial),
        Err(MapperError::MissingPrimaryKey(key)) if key == "locale"
    ));
    assert_eq!(count(&data_source, "translations", Criteria::new()), 2);

    assert!(translations.delete(&english)?);
    assert_eq!(count(&data_source, "translations", Criteria::new()), 1);
    Ok(())
}

#[test]
fn test_empty_primary_key_never_reaches_storage() -> anyhow::Result<()> {
    let manager = manager();
    let schema = MapperSchema::new("tags")
        .with_primary_key(Vec::<String>::new())
        .with_fields(["id", "name"]);

    assert!(matches!(
        DataMapper::<Tag>::new(schema, manager.data_source()),
        Err(MapperError::Configuration(_))
    ));
    assert_eq!(count(&manager.data_source(), "tags", Criteria::new()), 3);
    Ok(())
}

#[test]
fn test_missing_primary_key_fails_before_storage() -> anyhow::Result<()> {
    let manager = manager();
    let tags = manager.get::<Tag>()?;

    let mut tag = tags.create_entity(row([("name", "no id".into())]), EntityOptions::new().persisted(true))?;
    assert!(matches!(tags.save(&mut tag), Err(MapperError::MissingPrimaryKey(key)) if key == "id"));
    assert_eq!(tags.find_count(&QueryObject::default())?, 3);
    Ok(())
}

#[test]
fn test_bulk_operations() -> anyhow::Result<()> {
    let manager = manager();
    let articles = manager.get::<Article>()?;

    assert_eq!(
        articles.update_all_by(Criteria::new().and("id !=", 1001), row([("author_id", 1111.into())]), QueryOptions::new())?,
        2
    );
    assert!(matches!(
        articles.update_all(&QueryObject::default(), Row::new()),
        Err(MapperError::InvalidArgument(_))
    ));
    assert_eq!(articles.delete_all_by(Criteria::new().and("author_id", 1111), QueryOptions::new())?, 2);
    assert_eq!(articles.find_count(&QueryObject::default())?, 1);
    Ok(())
}

#[test]
fn test_save_many_and_delete_many() -> anyhow::Result<()> {
    let manager = manager();
    let tags = manager.get::<Tag>()?;

    let mut batch = tags.create_entities(
        vec![row([("name", "a".into())]), row([("name", "b".into())])],
        EntityOptions::new(),
    )?;
    assert!(tags.save_many(batch.iter_mut())?);
    assert!(batch.iter().all(|t| t.id.is_some()));

    assert!(tags.delete_many(batch.iter())?);
    assert_eq!(tags.find_count(&QueryObject::default())?, 3);

    // First failure stops the batch
    assert!(!tags.delete_many(batch.iter())?);
    Ok(())
}

#[test]
fn test_eager_load_belongs_to_and_has_many() -> anyhow::Result<()> {
    let manager = manager();
    let articles = manager.get::<Article>()?;

    let all = articles.find_all(&QueryObject::new(
        Criteria::new(),
        with(&["author", "comments"]),
    ))?;

    let authors: Vec<Option<&str>> = all
        .iter()
        .map(|a| a.author.as_ref().and_then(|au| au.name.as_deref()))
        .collect();
    assert_eq!(authors, vec![Some("Jon"), Some("Jon"), Some("Tony")]);

    let comment_ids: Vec<Vec<i64>> = all
        .iter()
        .map(|a| a.comments.iter().filter_map(|c| c.id).collect())
        .collect();
    assert_eq!(comment_ids, vec![vec![5001, 5000], vec![5002], vec![]]);

    // Tags were not requested
    assert!(all.iter().all(|a| a.tags.is_empty()));
    Ok(())
}

#[test]
fn test_eager_load_belongs_to_many() -> anyhow::Result<()> {
    let manager = manager();
    let articles = manager.get::<Article>()?;

    let all = articles.find_all(&QueryObject::new(Criteria::new(), with(&["tags"])))?;
    let tag_names: Vec<Vec<&str>> = all
        .iter()
        .map(|a| a.tags.iter().filter_map(|t| t.name.as_deref()).collect())
        .collect();

    assert_eq!(
        tag_names,
        vec![vec!["Tag #1", "Tag #2"], vec!["Tag #2"], Vec::<&str>::new()]
    );
    Ok(())
}

#[test]
fn test_eager_load_cardinality_when_nothing_matches() -> anyhow::Result<()> {
    let manager = manager();
    let authors = manager.get::<Author>()?;

    let tony = authors.get_by(
        Criteria::new().and("id", 2001),
        with(&["articles", "profile"]),
    )?;
    assert_eq!(tony.articles.len(), 1);
    assert!(tony.profile.is_none());

    let mut nobody = authors.create_entity(row([("name", "Nobody".into())]), EntityOptions::new())?;
    authors.save(&mut nobody)?;
    let nobody = authors.get_by(
        Criteria::new().and("id", nobody.id.unwrap_or_default()),
        with(&["articles", "profile"]),
    )?;
    assert!(nobody.articles.is_empty());
    assert!(nobody.profile.is_none());

    let jon = authors.get_by(Criteria::new().and("id", 2000), with(&["profile"]))?;
    assert_eq!(jon.profile.and_then(|p| p.bio).as_deref(), Some("Writer"));
    Ok(())
}

#[test]
fn test_eager_loaded_entities_are_persisted_in_their_mapper() -> anyhow::Result<()> {
    let manager = manager();
    let articles = manager.get::<Article>()?;
    let authors = manager.get::<Author>()?;

    let article = articles.get_by(Criteria::new().and("id", 1002), with(&["author"]))?;
    let author = article.author.expect("author loaded");
    assert!(authors.is_persisted(&author));
    assert!(!articles.is_persisted(&Article::default()));
    Ok(())
}

#[test]
fn test_dependent_belongs_to_many_removes_join_rows() -> anyhow::Result<()> {
    let manager = manager();
    let data_source = manager.data_source();
    let articles = manager.get::<Article>()?;

    let article = articles.get_by(Criteria::new().and("id", 1000), QueryOptions::new())?;
    assert!(articles.delete(&article)?);

    assert_eq!(count(&data_source, "articles_tags", Criteria::new().and("article_id", 1000)), 0);
    assert_eq!(count(&data_source, "articles_tags", Criteria::new().and("article_id", 1001)), 1);
    // Tags themselves stay
    assert_eq!(count(&data_source, "tags", Criteria::new()), 3);
    Ok(())
}

#[test]
fn test_dependent_has_many_cascades_through_related_hooks() -> anyhow::Result<()> {
    let manager = manager();
    let data_source = manager.data_source();
    let deleted = Rc::new(RefCell::new(Vec::new()));

    let log = Rc::clone(&deleted);
    manager.configure::<Comment, _>(move |data_source, manager| {
        let mut mapper = ObjectRelationalMapper::<Comment>::new(data_source, manager)?;
        let log = Rc::clone(&log);
        mapper
            .hooks_mut()
            .after_delete(move |comment| log.borrow_mut().extend(comment.id));
        Ok(mapper)
    });

    let articles = manager.get::<Article>()?;
    let article = articles.get_by(Criteria::new().and("id", 1000), QueryOptions::new())?;
    assert!(articles.delete(&article)?);

    let mut ids = deleted.borrow().clone();
    ids.sort_unstable();
    assert_eq!(ids, vec![5000, 5001]);
    assert_eq!(count(&data_source, "comments", Criteria::new()), 1);
    Ok(())
}

#[test]
fn test_non_dependent_has_many_leaves_children() -> anyhow::Result<()> {
    let manager = manager();
    let data_source = manager.data_source();
    let authors = manager.get::<Author>()?;

    let jon = authors.get_by(Criteria::new().and("id", 2000), QueryOptions::new())?;
    assert!(authors.delete(&jon)?);

    assert_eq!(count(&data_source, "articles", Criteria::new().and("author_id", 2000)), 2);
    // hasOne profile is dependent
    assert_eq!(count(&data_source, "profiles", Criteria::new()), 0);
    Ok(())
}

#[test]
fn test_vetoed_delete_does_not_cascade() -> anyhow::Result<()> {
    let manager = manager();
    let data_source = manager.data_source();

    let mut mapper = ObjectRelationalMapper::<Article>::new(manager.data_source(), &manager)?;
    mapper.hooks_mut().before_delete(|_| false);
    let articles = manager.add(mapper);

    let article = articles.get_by(Criteria::new().and("id", 1000), QueryOptions::new())?;
    assert!(!articles.delete(&article)?);
    assert_eq!(count(&data_source, "comments", Criteria::new().and("article_id", 1000)), 2);
    assert!(articles.is_persisted(&article));
    Ok(())
}

#[test]
fn test_association_validation() {
    let manager = manager();
    let mapper = || DataMapper::<Article>::new(Article::schema(), manager.data_source()).unwrap();

    let cases = [
        (
            Association::has_many("comments").class::<Comment>(),
            "hasMany `comments` is missing foreignKey",
        ),
        (
            Association::belongs_to("author").foreign_key("author_id"),
            "belongsTo `author` is missing class",
        ),
        (
            Association::belongs_to_many("tags")
                .class::<Tag>()
                .foreign_key("article_id")
                .other_foreign_key("tag_id"),
            "belongsToMany `tags` is missing joinTable",
        ),
        (
            Association::belongs_to_many("tags")
                .class::<Tag>()
                .foreign_key("article_id")
                .join_table("articles_tags"),
            "belongsToMany `tags` is missing otherForeignKey",
        ),
        (
            Association::has_one("").class::<Profile>().foreign_key("author_id"),
            "hasOne is missing propertyName",
        ),
    ];

    for (association, message) in cases {
        let err = ObjectRelationalMapper::with_mapper(mapper(), vec![association], &manager)
            .expect_err("definition should be rejected");
        assert!(matches!(&err, MapperError::Configuration(m) if m == message), "{err}");
    }
}

#[test]
fn test_manager_caches_and_adds() -> anyhow::Result<()> {
    let manager = manager();
    assert!(!manager.contains::<Tag>());

    let first = manager.get::<Tag>()?;
    let second = manager.get::<Tag>()?;
    assert!(Rc::ptr_eq(&first, &second));
    assert!(manager.contains::<Tag>());

    let custom = ObjectRelationalMapper::with_mapper(
        DataMapper::<Tag>::new(MapperSchema::new("labels").with_fields(["id", "name"]), manager.data_source())?,
        Vec::new(),
        &manager,
    )?;
    let added = manager.add(custom);
    let fetched = manager.get::<Tag>()?;
    assert!(Rc::ptr_eq(&added, &fetched));
    assert_eq!(fetched.data_mapper().schema().table(), "labels");
    Ok(())
}

#[test]
fn test_manager_configure_is_lazy() -> anyhow::Result<()> {
    let manager = manager();
    let built = Rc::new(RefCell::new(0));

    let counter = Rc::clone(&built);
    manager.configure::<Tag, _>(move |data_source, manager| {
        *counter.borrow_mut() += 1;
        ObjectRelationalMapper::<Tag>::new(data_source, manager)
    });
    assert_eq!(*built.borrow(), 0);

    manager.get::<Tag>()?;
    manager.get::<Tag>()?;
    assert_eq!(*built.borrow(), 1);
    Ok(())
}

#[test]
fn test_eager_load_fails_once_manager_is_gone() -> anyhow::Result<()> {
    let manager = manager();
    let articles = manager.get::<Article>()?;
    drop(manager);

    assert_eq!(articles.find_all(&QueryObject::default())?.len(), 3);
    let result = articles.find_all(&QueryObject::new(Criteria::new(), with(&["author"])));
    assert!(matches!(result, Err(MapperError::Configuration(_))));
    Ok(())
}

#[test]
fn test_data_source_errors_propagate_unchanged() -> anyhow::Result<()> {
    let manager = manager();
    let articles = manager.get::<Article>()?;

    let query = QueryObject::new(Criteria::new(), QueryOptions::new().order_by("missing", Direction::Asc));
    let err = articles.find_all(&query).unwrap_err();
    let MapperError::DataSource(source) = err else {
        panic!("expected a data source error");
    };
    assert!(source.downcast_ref::<quarry_store::StoreError>().is_some());
    Ok(())
}

#[test]
fn test_repository_delegates() -> anyhow::Result<()> {
    let manager = manager();
    let repository = Repository::new(manager.get::<Article>()?);

    let article = repository.get_by(Criteria::new().and("id", 1001), with(&["comments"]))?;
    assert_eq!(article.comments.len(), 1);
    assert!(repository.mapper().is_persisted(&article));

    assert!(repository.delete(&article)?);
    assert_eq!(repository.find_count(&QueryObject::default())?, 2);
    assert_eq!(count(&repository.data_source(), "comments", Criteria::new().and("article_id", 1001)), 0);
    Ok(())
}

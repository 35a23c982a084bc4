//! End-to-end profiling runs over encoded BSON documents.

use term_schema::aggregate::HistogramBucket;
use term_schema::bson::{ObjectId, Value};
use term_schema::prelude::*;
use tokio::sync::mpsc;

fn object_id(seconds: u32, counter: u8) -> ObjectId {
    let mut bytes = [0u8; 12];
    bytes[..4].copy_from_slice(&seconds.to_be_bytes());
    bytes[11] = counter;
    ObjectId::from_bytes(bytes)
}

fn two_documents() -> Vec<Vec<u8>> {
    vec![
        DocumentBuilder::new()
            .object_id("_id", object_id(1_700_000_000, 1))
            .int32("f1", 5)
            .string("f2", "šašo")
            .build(),
        DocumentBuilder::new()
            .object_id("_id", object_id(1_700_000_060, 2))
            .int32("f1", 10)
            .int32("f2", 20)
            .string("f3", "xyz")
            .build(),
    ]
}

fn groups_of(fields: &[FieldResult]) -> Vec<(String, BsonType, u64)> {
    let mut groups: Vec<_> = fields
        .iter()
        .flat_map(|f| f.types.iter())
        .map(|g| (g.name.clone(), g.bson_type, g.count))
        .collect();
    groups.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.tag().cmp(&b.1.tag())));
    groups
}

#[tokio::test]
async fn test_two_documents_default_config() {
    let profiler = Profiler::new(ProfileConfig::default().with_concurrency(3)).unwrap();
    let (fields, stats) = profiler.profile_documents(two_documents()).await.unwrap();

    assert_eq!(
        groups_of(&fields),
        vec![
            ("_id".to_string(), BsonType::ObjectId, 2),
            ("f1".to_string(), BsonType::Int, 2),
            ("f2".to_string(), BsonType::String, 1),
            ("f2".to_string(), BsonType::Int, 1),
            ("f3".to_string(), BsonType::String, 1),
        ]
    );
    for group in fields.iter().flat_map(|f| f.types.iter()) {
        assert!(group.value_stats.is_none());
        assert!(group.top.is_none());
        assert!(group.value_histogram.is_none());
    }

    assert_eq!(stats.documents, 2);
    assert_eq!(stats.observations, 7);
    assert_eq!(stats.groups, 5);
    assert_eq!(stats.fields, 4);
}

#[tokio::test]
async fn test_fields_are_sorted_and_types_ranked() {
    let profiler = Profiler::new(ProfileConfig::default()).unwrap();
    let docs = vec![
        DocumentBuilder::new().int32("b", 1).build(),
        DocumentBuilder::new().string("b", "x").build(),
        DocumentBuilder::new().string("b", "y").int32("a", 1).build(),
    ];
    let (fields, _) = profiler.profile_documents(docs).await.unwrap();

    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
    let b = &fields[1];
    assert_eq!(b.count, 3);
    assert_eq!(b.types[0].bson_type, BsonType::String);
    assert_eq!(b.types[1].bson_type, BsonType::Int);
}

#[tokio::test]
async fn test_value_histogram_of_ints() {
    let config = ProfileConfig::default()
        .with_concurrency(2)
        .with_value_histogram_resolution(5);
    let profiler = Profiler::new(config).unwrap();
    let docs: Vec<Vec<u8>> = (0..6).map(|i| DocumentBuilder::new().int32("n", i).build()).collect();

    let (fields, _) = profiler.profile_documents(docs).await.unwrap();
    let histogram = fields[0].types[0].value_histogram.clone().unwrap();
    assert_eq!(histogram.start, 0.0);
    assert_eq!(histogram.end, 9.0);
    assert_eq!(histogram.step, 3.0);
    assert_eq!(histogram.bucket_count, 3);
    assert_eq!(
        histogram.buckets,
        vec![HistogramBucket::new(0, 3), HistogramBucket::new(1, 3)]
    );
}

#[tokio::test]
async fn test_full_statistics_on_nested_documents() {
    let profiler = Profiler::new(ProfileConfig::full().with_top_n(2).with_bottom_n(1)).unwrap();
    let docs: Vec<Vec<u8>> = (0..10)
        .map(|i| {
            DocumentBuilder::new()
                .document(
                    "user",
                    DocumentBuilder::new()
                        .string("name", if i % 3 == 0 { "ann" } else { "bob" })
                        .int64("age", 20 + i),
                )
                .array("tags", vec![Value::String("a".into()), Value::String("bc".into())])
                .build()
        })
        .collect();

    let (fields, stats) = profiler.profile_documents(docs).await.unwrap();
    assert_eq!(stats.documents, 10);

    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["tags", "tags.[]", "user", "user.age", "user.name"]);

    let tags = &fields[0].types[0];
    assert_eq!(tags.bson_type, BsonType::Array);
    let lengths = tags.length_stats.as_ref().unwrap();
    assert_eq!((lengths.min, lengths.max, lengths.avg), (2, 2, 2.0));

    let elements = &fields[1];
    assert_eq!(elements.level, 1);
    assert_eq!(elements.count, 20);

    let name = &fields[4].types[0];
    let top = name.top.as_ref().unwrap();
    assert_eq!(top[0].value, Value::String("bob".into()));
    assert_eq!(top[0].count, 6);
    assert_eq!(name.unique_count, Some(2));
    let bottom = name.bottom.as_ref().unwrap();
    assert_eq!(bottom.len(), 1);
    assert_eq!(bottom[0].value, Value::String("ann".into()));

    let age = &fields[3].types[0];
    let value_stats = age.value_stats.as_ref().unwrap();
    assert_eq!(value_stats.min, Value::Int64(20));
    assert_eq!(value_stats.max, Value::Int64(29));
    assert_eq!(value_stats.avg, Some(24.5));
    assert_eq!(age.value_histogram.as_ref().unwrap().total_count(), 10);
}

#[tokio::test]
async fn test_numeric_strings_rank_numerically() {
    let profiler = Profiler::new(ProfileConfig::default().with_top_n(2)).unwrap();
    let docs: Vec<Vec<u8>> = (9..14)
        .map(|i| DocumentBuilder::new().string("code", i.to_string()).build())
        .collect();

    let (fields, _) = profiler.profile_documents(docs).await.unwrap();
    let top: Vec<Value> = fields[0].types[0]
        .top
        .as_ref()
        .unwrap()
        .iter()
        .map(|f| f.value.clone())
        .collect();
    assert_eq!(top, [Value::String("9".into()), Value::String("10".into())]);
}

#[tokio::test]
async fn test_max_depth_limits_levels() {
    let profiler = Profiler::new(ProfileConfig::default().with_max_depth(1)).unwrap();
    let doc = DocumentBuilder::new()
        .document(
            "a",
            DocumentBuilder::new().document("b", DocumentBuilder::new().int32("c", 1)),
        )
        .build();

    let (fields, _) = profiler.profile_documents(vec![doc]).await.unwrap();
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["a", "a.b"]);
    assert!(fields.iter().all(|f| f.level <= 1));
}

#[tokio::test]
async fn test_corrupted_document_aborts_run() {
    let profiler = Profiler::new(ProfileConfig::default().with_concurrency(4)).unwrap();
    let mut docs = two_documents();
    let mut broken = docs[0].clone();
    broken.truncate(broken.len() - 3);
    docs.push(broken);

    let err = profiler.profile_documents(docs).await.unwrap_err();
    assert!(matches!(err, ProfileError::CorruptedDocument { .. }));
    assert!(err.is_data_error());
}

#[tokio::test]
async fn test_unsupported_input_shape() {
    let profiler = Profiler::new(ProfileConfig::default()).unwrap();
    let (_tx, rx) = mpsc::channel::<u64>(1);
    let err = profiler.profile(rx).await.unwrap_err();
    assert!(matches!(err, ProfileError::UnsupportedInput { .. }));
}

#[tokio::test]
async fn test_group_results_from_another_backend() {
    let profiler = Profiler::new(ProfileConfig::default()).unwrap();
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        for (name, ty, count) in [
            ("x", BsonType::Double, 2),
            ("x.y", BsonType::Bool, 5),
            ("x", BsonType::Null, 7),
        ] {
            tx.send(GroupResult::new(name, ty, count)).await.unwrap();
        }
    });

    let (fields, stats) = profiler.profile(rx).await.unwrap();
    assert_eq!(stats.groups, 3);
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0].count, 9);
    assert_eq!(fields[0].types[0].bson_type, BsonType::Null);
    assert_eq!(fields[1].level, 1);
}

#[tokio::test]
async fn test_object_ids_profiled_as_dates() {
    let config = ProfileConfig::default()
        .with_object_id_as_date(true)
        .with_weekday_histogram(true)
        .with_timezone("+02:00");
    let profiler = Profiler::new(config).unwrap();
    let docs: Vec<Vec<u8>> = (0..3)
        .map(|i| {
            DocumentBuilder::new()
                .object_id("_id", object_id(1_709_424_000 + i * 60, i as u8))
                .build()
        })
        .collect();

    let (fields, _) = profiler.profile_documents(docs).await.unwrap();
    let id = &fields[0].types[0];
    assert_eq!(id.bson_type, BsonType::Date);
    // 2024-03-03 was a Sunday
    assert_eq!(id.weekday_histogram.as_ref().unwrap()[0], 3);
}

#[tokio::test]
async fn test_streaming_results_through_a_run() {
    let profiler = Profiler::new(ProfileConfig::default()).unwrap();
    let (tx, rx) = mpsc::channel(2);
    let mut run = profiler.spawn(rx).unwrap();

    tokio::spawn(async move {
        for doc in two_documents() {
            tx.send(doc).await.unwrap();
        }
    });

    let mut names = Vec::new();
    while let Some(field) = run.results.recv().await {
        names.push(field.name);
    }
    let stats = run.handle.await.unwrap().unwrap();
    assert_eq!(names, ["_id", "f1", "f2", "f3"]);
    assert_eq!(stats.fields, 4);
}

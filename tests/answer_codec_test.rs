mod common;

use common::{instance, questionnaire, select_option, text_option, FakeFileStore, FakeSampleTracker};
use studykit::engine::ValueCodec;
use studykit::models::{AnswerType, AnswerValue, InstanceStatus, SampleDto, UserFileDto};

fn multi_select(id: i64) -> studykit::models::AnswerOption {
    let mut option = select_option(id, 1, &["Fever", "Cough", "Headache"], &[1, 2, 3]);
    option.answer_type = AnswerType::MultiSelect;
    option
}

#[tokio::test]
async fn select_values_encode_to_labels_and_back() {
    let files = FakeFileStore::default();
    let samples = FakeSampleTracker::default();
    let codec = ValueCodec::new(&files, &samples);
    let inst = instance(InstanceStatus::Active, 1, questionnaire(1, vec![]));

    let single = select_option(10, 1, &["Yes", "No"], &[1, 0]);
    let stored = codec
        .encode(&inst, &single, Some(&AnswerValue::Number(0.0)))
        .await
        .unwrap();
    assert_eq!(stored, "No");
    assert_eq!(
        codec.decode(&single, &stored).await.unwrap(),
        Some(AnswerValue::Number(0.0))
    );

    let multi = multi_select(11);
    let stored = codec
        .encode(&inst, &multi, Some(&AnswerValue::Codes(vec![3, 1])))
        .await
        .unwrap();
    assert_eq!(stored, "Headache;Fever");
    assert_eq!(
        codec.decode(&multi, &stored).await.unwrap(),
        Some(AnswerValue::Codes(vec![3, 1]))
    );
}

#[tokio::test]
async fn unknown_select_labels_fail_decode() {
    let files = FakeFileStore::default();
    let samples = FakeSampleTracker::default();
    let codec = ValueCodec::new(&files, &samples);

    let single = select_option(10, 1, &["Yes", "No"], &[1, 0]);
    assert!(codec.decode(&single, "Maybe").await.is_err());
}

#[tokio::test]
async fn empty_string_decodes_to_no_value_except_for_text() {
    let files = FakeFileStore::default();
    let samples = FakeSampleTracker::default();
    let codec = ValueCodec::new(&files, &samples);

    let single = select_option(10, 1, &["Yes", "No"], &[1, 0]);
    assert_eq!(codec.decode(&single, "").await.unwrap(), None);

    let text = text_option(11, 1);
    assert_eq!(
        codec.decode(&text, "").await.unwrap(),
        Some(AnswerValue::Text(String::new()))
    );
}

#[tokio::test]
async fn files_are_stored_on_encode_and_named_on_decode() {
    let files = FakeFileStore::default();
    let samples = FakeSampleTracker::default();
    let codec = ValueCodec::new(&files, &samples);
    let inst = instance(InstanceStatus::Active, 1, questionnaire(1, vec![]));

    let mut option = text_option(10, 1);
    option.answer_type = AnswerType::File;

    let file = AnswerValue::File(UserFileDto {
        file: "ZGF0YQ==".to_string(),
        file_name: "finding.pdf".to_string(),
    });
    let stored = codec.encode(&inst, &option, Some(&file)).await.unwrap();
    assert_eq!(stored, "1");

    // decode resolves the name but never re-embeds the content
    let decoded = codec.decode(&option, &stored).await.unwrap();
    assert_eq!(
        decoded,
        Some(AnswerValue::File(UserFileDto {
            file: String::new(),
            file_name: "finding.pdf".to_string(),
        }))
    );
}

#[tokio::test]
async fn decoding_a_dangling_file_id_fails() {
    let files = FakeFileStore::default();
    let samples = FakeSampleTracker::default();
    let codec = ValueCodec::new(&files, &samples);

    let mut option = text_option(10, 1);
    option.answer_type = AnswerType::Image;
    assert!(codec.decode(&option, "42").await.is_err());
}

#[tokio::test]
async fn samples_register_with_the_tracker_on_encode() {
    let files = FakeFileStore::default();
    let samples = FakeSampleTracker::default();
    let codec = ValueCodec::new(&files, &samples);
    let inst = instance(InstanceStatus::Active, 1, questionnaire(1, vec![]));

    let mut option = text_option(10, 1);
    option.answer_type = AnswerType::Sample;

    let sample = AnswerValue::Sample(SampleDto {
        sample_id: "ZIFCO-1234567899".to_string(),
        dummy_sample_id: Some("ZIFCO-1234567898".to_string()),
    });
    let stored = codec.encode(&inst, &option, Some(&sample)).await.unwrap();
    assert_eq!(stored, "ZIFCO-1234567899;ZIFCO-1234567898");
    assert_eq!(samples.registered.lock().unwrap().len(), 1);

    assert_eq!(codec.decode(&option, &stored).await.unwrap(), Some(sample));
}

#[tokio::test]
async fn rejected_samples_abort_the_encode() {
    let files = FakeFileStore::default();
    let samples = FakeSampleTracker {
        rejected: vec!["ZIFCO-0000000000".to_string()],
        ..Default::default()
    };
    let codec = ValueCodec::new(&files, &samples);
    let inst = instance(InstanceStatus::Active, 1, questionnaire(1, vec![]));

    let mut option = text_option(10, 1);
    option.answer_type = AnswerType::Sample;

    let sample = AnswerValue::Sample(SampleDto {
        sample_id: "ZIFCO-0000000000".to_string(),
        dummy_sample_id: None,
    });
    assert!(codec.encode(&inst, &option, Some(&sample)).await.is_err());
    assert!(samples.registered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn numbers_store_like_their_literals() {
    let files = FakeFileStore::default();
    let samples = FakeSampleTracker::default();
    let codec = ValueCodec::new(&files, &samples);
    let inst = instance(InstanceStatus::Active, 1, questionnaire(1, vec![]));

    let mut option = text_option(10, 1);
    option.answer_type = AnswerType::Number;

    let stored = codec
        .encode(&inst, &option, Some(&AnswerValue::Number(2.0)))
        .await
        .unwrap();
    assert_eq!(stored, "2");
    assert_eq!(
        codec.decode(&option, &stored).await.unwrap(),
        Some(AnswerValue::Number(2.0))
    );

    // cleared answers encode to the empty string and keep their row
    assert_eq!(codec.encode(&inst, &option, None).await.unwrap(), "");
}

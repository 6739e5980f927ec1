//! Symptom-diary bridging towards a SORMAS instance.
//!
//! Converts released questionnaire answers into the SORMAS symptoms DTO,
//! syncs proband data from a SORMAS person record and manages follow-up
//! bookkeeping. The REST wire client stays behind the [`SormasGateway`]
//! trait; this module only carries the domain logic.

pub mod diary;
pub mod mapper;
pub mod pseudonym;

pub use diary::{
    JournalPerson, PersonalDataClient, PseudonymSettings, SormasError, SormasGateway,
    SymptomDiaryService, UserServiceClient,
};
pub use mapper::{map_answers_to_symptoms, Bool3, SymptomsDto, TemperatureSource};
pub use pseudonym::{generate_checksum, generate_random_pseudonym, validate_checksum};

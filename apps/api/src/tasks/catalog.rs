use crate::models::task::{OnboardingTask, TaskType};

/// (id, title, description, type, required)
const DEFAULT_TASKS: [(&str, &str, &str, TaskType, bool); 7] = [
    (
        "sign-nda",
        "Sign the NDA",
        "Read and sign the non-disclosure agreement.",
        TaskType::Document,
        true,
    ),
    (
        "upload-cv",
        "Upload your CV",
        "Upload an up-to-date CV for your personnel file.",
        TaskType::Upload,
        true,
    ),
    (
        "complete-profile",
        "Complete your profile",
        "Fill in contact details, emergency contact and a short bio.",
        TaskType::Form,
        true,
    ),
    (
        "welcome-video",
        "Watch the welcome video",
        "A short introduction to the company, its history and values.",
        TaskType::Video,
        true,
    ),
    (
        "policies-quiz",
        "Company policies quiz",
        "Answer a few questions on workplace policies. 80% to pass.",
        TaskType::Quiz,
        true,
    ),
    (
        "payroll-details",
        "Submit payroll details",
        "Provide bank and tax details so you get paid on time.",
        TaskType::Form,
        true,
    ),
    (
        "meet-mentor",
        "Meet your mentor",
        "Book a first coffee with your assigned onboarding mentor.",
        TaskType::Meeting,
        false,
    ),
];

/// The fixed catalog used when no remote catalog is configured.
pub fn default_catalog() -> Vec<OnboardingTask> {
    DEFAULT_TASKS
        .iter()
        .zip(1..)
        .map(|((id, title, description, task_type, required), order)| OnboardingTask {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            task_type: *task_type,
            required: *required,
            order,
        })
        .collect()
}

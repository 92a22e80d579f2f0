//! Built-in clinic FAQ.

use super::FaqEntry;

fn entry(question: &str, variations: &[&str], answer: &str) -> FaqEntry {
    FaqEntry {
        question: question.to_string(),
        variations: variations.iter().map(|v| v.to_string()).collect(),
        answer: answer.to_string(),
    }
}

/// The default corpus, in match priority order.
pub fn default_corpus() -> Vec<FaqEntry> {
    vec![
        entry(
            "What payment methods are available?",
            &[
                "what payment methods do you accept",
                "how can I pay",
                "payment options",
                "do you accept credit cards",
                "can I pay in cash",
                "¿cuáles son los métodos de pago?",
                "¿cómo puedo pagar?",
                "¿aceptan tarjeta?",
            ],
            "We accept credit and debit cards and cash. Card payments are processed securely at reception.",
        ),
        entry(
            "How do I cancel an appointment?",
            &[
                "how to cancel",
                "how can I cancel my booking",
                "cómo cancelar",
                "anular turno",
            ],
            "To cancel, type 'cancel' at any point during the conversation, or call the front desk at least 24 hours in advance.",
        ),
        entry(
            "What are your opening hours?",
            &[
                "when are you open",
                "what time do you open",
                "what time do you close",
                "office hours",
                "horario de atención",
                "¿a qué hora abren?",
            ],
            "We are open Monday to Friday, 08:00 to 12:00 and 14:00 to 18:00.",
        ),
        entry(
            "Where is the clinic located?",
            &[
                "what is your address",
                "where are you",
                "how do I get to the clinic",
                "¿dónde están ubicados?",
                "dirección de la clínica",
            ],
            "The clinic is at 120 Health Avenue, ground floor. Street parking is available nearby.",
        ),
        entry(
            "Do you accept health insurance?",
            &[
                "which insurance plans do you take",
                "is my insurance accepted",
                "do you work with insurance companies",
                "¿aceptan seguro médico?",
            ],
            "We work with most major insurance providers. Bring your insurance card and ID to every visit.",
        ),
        entry(
            "What are your prices?",
            &[
                "how much does it cost",
                "how much do you charge",
                "price list",
                "¿cuánto cuesta?",
                "precios",
            ],
            "A general medicine visit costs 40 USD and specialist visits start at 60 USD. Insurance coverage may reduce the cost.",
        ),
        entry(
            "What specialties do you offer?",
            &[
                "which doctors are available",
                "what kind of doctors do you have",
                "list of specialties",
                "especialidades disponibles",
            ],
            "We offer General Medicine, Pediatrics, Cardiology, Dermatology, Gynecology, Traumatology, Ophthalmology, Neurology, Psychology and Nutrition.",
        ),
        entry(
            "What should I bring to my visit?",
            &[
                "what do I need to bring",
                "documents needed",
                "¿qué debo llevar?",
            ],
            "Please bring your ID, your insurance card and any previous test results. Arrive 15 minutes early.",
        ),
    ]
}

use crate::reflect::parser::ReflectionInsights;

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{count} {one}")
    } else {
        format!("{count} {many}")
    }
}

/// Template reflection built from counts alone, used when no provider
/// produced a valid reply.
pub fn fallback_insights(entry_count: usize, average_word_count: u32) -> ReflectionInsights {
    if entry_count == 0 {
        return ReflectionInsights {
            overview_text: "This was a quiet month in your journal, with 0 entries written."
                .to_string(),
            observations: vec![
                "No journal entries were recorded during this period.".to_string(),
                "Quiet stretches are part of any reflective practice.".to_string(),
            ],
            theme_reflection: "Without written entries there is no theme to trace this month, and that pause is simply part of your story."
                .to_string(),
            closing_question: "What would make it feel natural to write a few lines in the weeks ahead?"
                .to_string(),
        };
    }

    let entries = plural(entry_count, "entry", "entries");
    ReflectionInsights {
        overview_text: format!(
            "You wrote {entries} this month, averaging about {} each.",
            plural(average_word_count as usize, "word", "words")
        ),
        observations: vec![
            format!("You came back to your journal {} during this period.", plural(entry_count, "time", "times")),
            format!("Your entries averaged around {average_word_count} words."),
        ],
        theme_reflection: "Each entry holds a moment of this month in your own words, and together they show the time you set aside to reflect."
            .to_string(),
        closing_question: "Looking back over these entries, which moment stands out to you most?"
            .to_string(),
    }
}

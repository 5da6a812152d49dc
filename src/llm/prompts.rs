use crate::agent_engine::state::TaskPhase;

const FORMAT_RULE: &str = "CRITICAL: Respond with ONLY ONE action line in the exact format shown below.";
const NO_EXPLANATIONS: &str = "Do NOT provide explanations. Only respond with the action line.";

/// Step prompt for the vision model. `prompt_step_cap` is only shown to the
/// model and is unrelated to the real step budget.
pub fn build_step_prompt(
    instruction: &str,
    step: u32,
    prompt_step_cap: u32,
    phase: TaskPhase,
) -> String {
    let (goal, options): (&str, &[&str]) = match phase {
        TaskPhase::SearchPending => (
            "Locate the search bar or search icon on this screen.",
            &[
                "TAP (x,y) # Search bar",
                "TAP (x,y) # Search icon",
                "SCROLL down # to find search",
            ],
        ),
        TaskPhase::SearchStarted => (
            "Look for a text input field or search box where you can type.",
            &[
                "TYPE 'search terms' # search query",
                "TAP (x,y) # search input field",
                "SCROLL down # to find input",
            ],
        ),
        TaskPhase::QueryEntered => (
            "Look for search results or product filters.",
            &[
                "TAP (x,y) # product or filter",
                "SCROLL down # see more results",
                "TASK_COMPLETE: Found relevant products",
            ],
        ),
    };

    format!(
        "Task: {instruction}\nStep: {step}/{prompt_step_cap}\n\n{FORMAT_RULE}\n\n{goal}\n\n\
         RESPOND WITH EXACTLY ONE OF THESE:\n{}\n\n{NO_EXPLANATIONS}\n",
        options.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_uses_prompt_cap_not_budget() {
        let p = build_step_prompt("find watermelons", 3, 15, TaskPhase::SearchPending);
        assert!(p.starts_with("Task: find watermelons\nStep: 3/15\n"));
        assert!(p.contains("search bar or search icon"));
    }

    #[test]
    fn each_phase_lists_its_replies() {
        let started = build_step_prompt("t", 1, 15, TaskPhase::SearchStarted);
        assert!(started.contains("TYPE '"));
        let entered = build_step_prompt("t", 1, 15, TaskPhase::QueryEntered);
        assert!(entered.contains("TASK_COMPLETE:"));
        assert!(!entered.contains("TYPE '"));
    }
}

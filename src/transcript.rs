use serde::Serialize;

use crate::api::{Message, ToolCall};
use crate::test_suite::Test;
use crate::tools::{FINISH_TOOL, ToolCatalog};

/// Append-only conversation history for one agent run.
///
/// Messages are never edited or removed once pushed, so a transcript can be
/// replayed exactly. The model always receives the whole history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Start a transcript with the system prompt and the task statement.
    pub fn start(test: &Test, catalog: &ToolCatalog) -> Self {
        let mut transcript = Self::default();
        transcript.push(Message::system(system_prompt(catalog)));
        transcript.push(Message::user(task_prompt(test)));
        transcript
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn push_observation(&mut self, observation: impl Into<String>) {
        self.push(Message::user(observation));
    }

    /// Record the model's turn with at most the one call that will be dispatched.
    pub fn push_assistant(&mut self, text: impl Into<String>, selected: Option<&ToolCall>) {
        self.push(Message::assistant(text, selected.cloned().into_iter().collect()));
    }

    pub fn push_tool_result(&mut self, call: &ToolCall, content: impl Into<String>) {
        self.push(Message::tool_result(call, content));
    }

    /// Whether a `finish` call was ever dispatched in this transcript.
    pub fn contains_finish_call(&self) -> bool {
        self.messages
            .iter()
            .flat_map(|m| m.tool_calls.iter())
            .any(|c| c.name == FINISH_TOOL)
    }

    fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

fn system_prompt(catalog: &ToolCatalog) -> String {
    let mut prompt = String::from(
        "You are a web browsing agent. You control a browser page through tools and \
         must accomplish the user's goal.\n\nAvailable tools:\n",
    );
    for signature in catalog.signatures() {
        prompt.push_str("- ");
        prompt.push_str(&signature);
        prompt.push('\n');
    }
    prompt.push_str(
        "\nCall exactly one tool per turn. Each turn you will see the current page \
         followed by the result of your previous tool call. When the goal is \
         achieved, call `finish` with the result.",
    );
    prompt
}

fn task_prompt(test: &Test) -> String {
    let mut prompt = format!("Goal: {}\nStarting URL: {}", test.goal, test.url);
    if !test.constraints.is_empty() {
        prompt.push_str("\nConstraints:");
        for constraint in &test.constraints {
            prompt.push_str("\n- ");
            prompt.push_str(constraint);
        }
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Role;
    use crate::testing::sample_test;
    use crate::tools::BROWSER_CAPABILITIES;
    use serde_json::json;

    fn catalog() -> ToolCatalog {
        ToolCatalog::from_capabilities(BROWSER_CAPABILITIES)
    }

    #[test]
    fn start_has_system_and_task_messages() {
        let transcript = Transcript::start(&sample_test(), &catalog());
        assert_eq!(transcript.len(), 2);

        let system = &transcript.messages()[0];
        assert_eq!(system.role, Role::System);
        assert!(system.content.contains("- navigate(url: string)"));
        assert!(system.content.contains("- finish(result: string)"));
        assert!(system.content.contains("exactly one tool per turn"));

        let task = &transcript.messages()[1];
        assert_eq!(task.role, Role::User);
        assert!(task.content.contains("Goal: Find the AI agent book"));
        assert!(task.content.contains("Starting URL: https://shop.example"));
        assert!(task.content.contains("- Use the search box"));
        assert!(!task.content.contains("oracle"));
    }

    #[test]
    fn appends_in_order() {
        let mut transcript = Transcript::start(&sample_test(), &catalog());
        let call = ToolCall::new("c1", "navigate", json!({"url": "https://shop.example"}));

        transcript.push_observation("Current page:\n<body></body>");
        transcript.push_assistant("", Some(&call));
        transcript.push_tool_result(&call, "ok");

        let roles: Vec<Role> = transcript.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::User, Role::Assistant, Role::Tool]
        );
        assert_eq!(transcript.messages()[3].tool_calls, vec![call]);
        assert!(!transcript.contains_finish_call());
    }

    #[test]
    fn detects_finish_call() {
        let mut transcript = Transcript::start(&sample_test(), &catalog());
        let finish = ToolCall::new("f", "finish", json!({"result": "done"}));
        transcript.push_assistant("", Some(&finish));
        assert!(transcript.contains_finish_call());
    }

    #[test]
    fn serializes_as_message_array() {
        let transcript = Transcript::start(&sample_test(), &catalog());
        let json = serde_json::to_value(&transcript).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["role"], "system");
    }
}

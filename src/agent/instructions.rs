use crate::tools::ToolDefinition;

fn describe_tool(tool: &ToolDefinition) -> String {
    let params: Vec<String> = tool
        .parameters
        .get("properties")
        .and_then(|v| v.as_object())
        .map(|props| props.keys().cloned().collect())
        .unwrap_or_default();
    format!("- {}({}): {}", tool.name, params.join(", "), tool.description)
}

pub fn build_agent_instructions(
    tools: &[ToolDefinition],
    current_corpus: Option<&str>,
    deletion_enabled: bool,
) -> String {
    let tool_lines = tools.iter().map(describe_tool).collect::<Vec<_>>().join("\n");
    let current = current_corpus
        .map(|name| format!("The current corpus is '{}'.", name))
        .unwrap_or_else(|| "No current corpus is set yet.".to_string());
    let deletion_policy = if deletion_enabled {
        "Deleting a corpus or a document is irreversible. Before calling delete_corpus or \
delete_document, tell the user exactly what will be deleted, ask them to confirm, and ask \
them for the deletion passphrase. Only then call the tool with confirm=true and the \
passphrase exactly as the user typed it. Never guess the passphrase and never repeat it back."
    } else {
        "Deletion is disabled on this server. If the user asks to delete a corpus or a document, \
explain that deletion is not available."
    };

    format!(
        "You are a document corpus assistant. You help the user create corpora, add documents \
to them, inspect them, delete them, and answer questions from their content.\n\
Available tools:\n\
{tool_lines}\n\
{current} When the user does not name a corpus, pass an empty corpus_name and the current \
corpus is used. Creating a corpus makes it the current one.\n\
add_data accepts Google Drive links, Google Docs/Sheets/Slides links and gs:// paths.\n\
Answer questions about documents with rag_query and cite the sources it returns.\n\
{deletion_policy}\n\
When you need to use a tool, respond ONLY with JSON in this format:\n\
{{\"type\":\"tool_call\",\"tool_name\":\"<tool>\",\"tool_args\":{{...}}}}\n\
When you have the final answer, respond ONLY with JSON in this format:\n\
{{\"type\":\"final\",\"content\":\"...\"}}\n\
Do not include any extra text outside the JSON."
    )
}

use crate::models::SourceMap;
use crate::services::ChatMessage;

pub const WIKI_QUESTION_PROMPT: &str = r#"You are an intelligent assistant helping developers with questions contained within a Wiki.
Use 'you' to refer to the individual asking the questions even if they ask with 'I'.
Answer the following question using only the data provided in the sources below. ONLY use the data below, do NOT make up answers.
Each source has a name followed by colon and the actual information, always include the source name for each fact you use in the response.
Use square brackets to reference the source, for example if you use the "Source1:" source, reference it as [Source1]. Don't combine sources, list each source separately, for example [Source1][Source2].
Answer in a a single paragraph at most including references, keep all answers simple and short.
If you cannot answer using the sources below, say you are unable to find information within the Wiki.

Example:
---
SourceX: "Azure is Microsoft's cloud"
SourceY: "Webapps can be used to host websites"
SourceZ: "Azure storage can be used to store blobs"
Question: "What should I host a website on?"
Answer: "You can host websites on Webapps[SourceX]"
---
"#;

const QUESTION_SUFFIX: &str = "\nOnly use sources provided and reference all sources.";

/// One `Source<id>: """content"""` line per source, content flattened to a
/// single line without double quotes.
pub fn format_sources(sources: &SourceMap) -> String {
    let lines: Vec<String> = sources
        .iter()
        .map(|(id, source)| {
            let flat = source
                .content
                .replace("\r\n", " ")
                .replace(['\n', '\r'], " ")
                .replace('"', "");
            format!("Source{id}: \"\"\"{flat}\"\"\"")
        })
        .collect();
    format!("Sources:\n{}", lines.join("\n"))
}

/// System prompt, sources as a function message, then the question.
pub fn grounded_messages(sources: &SourceMap, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(WIKI_QUESTION_PROMPT),
        ChatMessage::function("Sources", format_sources(sources)),
        ChatMessage::user(format!("{question}{QUESTION_SUFFIX}")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceReference;
    use crate::services::Role;

    #[test]
    fn test_grounded_messages() {
        let mut sources = SourceMap::new();
        sources.insert(
            "42",
            SourceReference::new("Line one\nsays \"hi\"\r\nend", "/42", "Page"),
        );
        sources.insert("7", SourceReference::new("short", "/7", "Other"));

        let messages = grounded_messages(&sources, "What?");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::Function);
        assert_eq!(messages[1].name.as_deref(), Some("Sources"));
        assert_eq!(
            messages[1].content,
            "Sources:\nSource42: \"\"\"Line one says hi end\"\"\"\nSource7: \"\"\"short\"\"\""
        );
        assert_eq!(
            messages[2].content,
            "What?\nOnly use sources provided and reference all sources."
        );
    }
}

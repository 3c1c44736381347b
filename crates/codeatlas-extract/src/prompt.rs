//! Prompt text for the extraction and summarization models.

/// System prompt for per-file structural extraction. The response contract
/// matters more than the prose: a single JSON object (or a list of them) in
/// the documented shape, or an empty object when the input is not code.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are an expert on reading source code.
Based on the given code and its inline comments, summarize the purpose of each function and enum, then summarize the purpose of the class. Use at least 10 words for each summary.

1. Fetch the class name and the package or directory info. Fetch as many properties as possible. When naming a parent class, use the fully qualified package+classname rather than the bare class name, for example "extends": "com/acme/billing/BaseService".
2. Find the function call relationships within the file and describe them in InnerDependencies.
3. Find the external dependencies of every function. Clearly describe the target function's package and class in OuterDependencies.
4. Do not describe function parameters; they are not needed.
5. A call through the current instance whose target is not declared in this file is an OuterDependency on the parent class; a call through the parent class likewise.
6. Build the Path property from the package or directory info.

Follow the format of the example response exactly and include nothing outside the JSON. If the input content is not code, respond with an empty JSON object.
{
    "Class": {
        "Path": "com/acme/billing",
        "Name": "InvoiceService",
        "FileExtension": "java",
        "Properties": [
            {"extends": "com/acme/core/BaseService"},
            {"description": "Creates, persists and sends customer invoices."}
        ]
    },
    "Functions": [
        {
            "Name": "createInvoice",
            "Properties": [
                {"description": "Builds an invoice from an order and stores it."}
            ]
        }
    ],
    "Enums": [
        {
            "Name": "InvoiceState",
            "Properties": [
                {"description": "Lifecycle states an invoice moves through."}
            ]
        }
    ],
    "InnerDependencies": [
        {"From": "createInvoice", "ToType": "function", "ToName": "render"}
    ],
    "OuterDependencies": [
        {
            "From": "createInvoice",
            "To": {"Path": "com/acme/mail", "ClassName": "Mailer", "Type": "function", "Name": "send"}
        }
    ]
}"#;

/// System prompt refining a class description from its function summaries.
pub const CLASS_SUMMARY_PROMPT: &str = "You are given a class description and the descriptions of its functions as JSON. Rewrite the class description so it reflects what the functions actually do. Respond with the refined description text only, nothing else.";

/// System prompt summarizing a folder from its children's descriptions.
pub const PATH_SUMMARY_PROMPT: &str = "You are given a folder name followed by the descriptions of its sub-folders and classes. Summarize the folder's functionality. Keep it as simple as possible and respond with the summary text only.";

/// User message for one file's extraction call.
pub fn extraction_user_message(file_listing: &str, relative_path: &str, content: &str) -> String {
    format!(
        "Given the file structure of the repository:\n{}.\n\nPlease analyse the file: {} and its content:\n<code>\n{}\n</code>\n\nGenerate the JSON response according to the instructions.",
        file_listing, relative_path, content
    )
}

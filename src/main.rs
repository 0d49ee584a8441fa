use std::collections::HashMap;

use query_wizard::wizard_csv::SavedQueryAction;
use query_wizard::{FieldsApi, FieldsTransport, RawFields, WizardCsv, WizardText};

/// Canned fields document standing in for the platform endpoint.
struct DemoTransport;

impl FieldsTransport for DemoTransport {
    fn fetch_fields(&self) -> anyhow::Result<RawFields> {
        let raw = serde_json::from_value(serde_json::json!({
            "generic": [
                {"name": "specific_data.data.hostname", "title": "Host Name", "type": "string"},
                {"name": "specific_data.data.os.type", "title": "OS: Type", "type": "string"},
                {"name": "specific_data.data.last_seen", "title": "Last Seen", "type": "string"},
                {
                    "name": "specific_data.data.installed_software",
                    "title": "Installed Software",
                    "type": "array",
                    "items": {
                        "type": "array",
                        "items": [
                            {"name": "name", "title": "Software Name", "type": "string"},
                            {"name": "version", "title": "Software Version", "type": "string"}
                        ]
                    }
                }
            ],
            "specific": {
                "aws_adapter": [
                    {"name": "adapters_data.aws_adapter.instance_id", "title": "Instance ID", "type": "string"}
                ]
            }
        }))?;
        Ok(raw)
    }
}

/// Existing saved queries keyed by name.
struct DemoSavedQueries(HashMap<String, String>);

impl query_wizard::SavedQueryLookup for DemoSavedQueries {
    fn get_by_name(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    println!("--- Query Wizard: text and csv documents to AQL ---");

    let fields = FieldsApi::new(DemoTransport);

    println!("\n[step 1]: fetching field schema catalog...");
    let catalog = fields.get()?;
    for (adapter, schemas) in catalog.iter() {
        println!("adapter {} with {} field schemas", adapter, schemas.len());
    }

    let text_doc = "\
# devices that look like test hosts
simple hostname contains test
complex installed_software
complex_sub name contains chrome
complex_sub version earlier_than 99
simple or os.type equals windows
";
    println!("\n[input text document]:\n{text_doc}");

    println!("[step 2]: parsing the text document...");
    let text = WizardText::new(&fields);
    let result = text.parse(text_doc)?;
    println!("built filter:\n{}", result.filter);
    println!(
        "\nexpressions:\n{}",
        serde_json::to_string_pretty(&result.expressions)?
    );

    let csv_doc = "\
type,query,name,description,tags,fields
saved_query,,test devices,hosts that look like tests,\"demo,test\",\"hostname,os.type\"
simple,hostname contains test,,,,
simple,aws:instance_id exists,,,,
saved_query,,stale devices,,demo,default
simple,last_seen exists,,,,
";
    println!("\n[input csv document]:\n{csv_doc}");

    println!("[step 3]: parsing the csv document...");
    let known = DemoSavedQueries(HashMap::from([(
        "stale devices".to_string(),
        "3a5b0c77".to_string(),
    )]));
    let csv = WizardCsv::new(&fields)
        .with_lookup(&known)
        .with_default_fields(vec!["specific_data.data.last_seen".to_string()]);
    for intent in csv.parse(csv_doc)? {
        let action = match &intent.action {
            SavedQueryAction::Create => "create".to_string(),
            SavedQueryAction::Update(uuid) => format!("update {uuid}"),
        };
        println!("\nsaved query {:?} ({action})", intent.name);
        println!("  fields: {:?}", intent.fields);
        if let Some(query) = &intent.query {
            println!("  filter: {}", query.filter);
        }
    }

    println!("\n[step 4]: resolution errors list alternatives...");
    match text.parse("simple hstname exists") {
        Ok(_) => println!("unexpectedly resolved"),
        Err(err) => println!("{err}"),
    }
    Ok(())
}

use schemars::schema_for;

use crate::model::{FlowChart, PortfolioDefinition};

/// JSON Schemas for the portfolio definition file and generated flow charts.
pub fn get_schema_json() -> String {
    let schemas = serde_json::json!({
        "PortfolioDefinition": schema_for!(PortfolioDefinition),
        "FlowChart": schema_for!(FlowChart),
    });
    serde_json::to_string_pretty(&schemas).unwrap_or_else(|e| {
        serde_json::json!({ "error": format!("Serialization error: {e}") }).to_string()
    })
}

/// Print the JSON Schemas.
pub fn run() -> anyhow::Result<()> {
    println!("{}", get_schema_json());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_names_both_documents() {
        let json: serde_json::Value = serde_json::from_str(&get_schema_json()).unwrap();
        assert!(json.get("PortfolioDefinition").is_some());
        assert!(json["FlowChart"].to_string().contains("symbolList"));
    }
}

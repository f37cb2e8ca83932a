use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

use super::load_prompts;
use crate::config::TurncoachConfig;

pub fn run(config: &TurncoachConfig) -> Result<()> {
    let prompts = load_prompts(config)?;
    let scenarios = prompts.scenarios();
    if scenarios.is_empty() {
        println!("No scenarios in prompt catalog");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Scenario").fg(Color::Cyan),
        Cell::new("Persona").fg(Color::Cyan),
        Cell::new("Brief").fg(Color::Cyan),
    ]);

    for scenario in scenarios {
        let info = prompts.scenario_info(scenario)?;
        table.add_row(vec![
            Cell::new(&info.scenario),
            Cell::new(&info.persona),
            Cell::new(&info.brief),
        ]);
    }

    println!("{table}");
    Ok(())
}

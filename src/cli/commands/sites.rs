//! Show the effective site profiles.

use console::style;

use crate::cli::icons;
use kirana::collector::ScrollStrategy;
use kirana::config::Config;
use kirana::extract::SiteId;

pub async fn cmd_sites(config: &Config) -> anyhow::Result<()> {
    for id in SiteId::ALL {
        let profile = config.site_profile(id);
        let scroll = match profile.scroll {
            ScrollStrategy::ToBottom => "to bottom".to_string(),
            ScrollStrategy::LastCardIntoView => "last card into view".to_string(),
            ScrollStrategy::Step(px) => format!("{}px steps", px),
        };
        let overridden = if config.sites.contains_key(&id) {
            style(" (overridden)").yellow().to_string()
        } else {
            String::new()
        };

        println!(
            "{} {} [{}]{}",
            icons::info(),
            style(id.display_name()).bold(),
            id,
            overridden
        );
        println!("  cards:   {}", profile.card_selector);
        println!("  ready:   {}", profile.ready_selector);
        println!("  search:  {}", profile.search_url);
        println!("  budget:  {} records, {}", profile.max_records, scroll);
    }
    Ok(())
}

// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command, crate_version};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print one JSON object per line"),
    )
}

fn req(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).required(true).help(help)
}

fn opt(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).help(help)
}

fn date_arg() -> Arg {
    req("date", "Date (YYYY-MM-DD)")
}

fn account_cmd() -> Command {
    Command::new("account")
        .about("Manage accounts")
        .subcommand_required(true)
        .subcommand(
            Command::new("add")
                .about("Add an account")
                .arg(req("name", "Account name"))
                .arg(
                    Arg::new("type")
                        .long("type")
                        .default_value("bank")
                        .value_parser(["bank", "cash", "savings", "investment", "broker"])
                        .help("Account type"),
                )
                .arg(req("currency", "ISO currency code"))
                .arg(opt("initial-balance", "Opening balance").default_value("0"))
                .arg(
                    Arg::new("order")
                        .long("order")
                        .value_parser(clap::value_parser!(i64))
                        .help("Display position"),
                ),
        )
        .subcommand(json_flags(Command::new("list").about("List accounts")))
        .subcommand(
            Command::new("rm")
                .about("Remove an account and its transactions")
                .arg(req("name", "Account name")),
        )
}

fn tx_cmd() -> Command {
    Command::new("tx")
        .about("Record and list transactions")
        .subcommand_required(true)
        .subcommand(
            Command::new("income")
                .about("Record income")
                .arg(date_arg())
                .arg(req("account", "Account name"))
                .arg(req("amount", "Amount in the account currency"))
                .arg(
                    Arg::new("type")
                        .long("type")
                        .default_value("work")
                        .value_parser(["work", "extra"])
                        .help("Income type"),
                )
                .arg(opt("description", "Description")),
        )
        .subcommand(
            Command::new("cost")
                .about("Record spending")
                .arg(date_arg())
                .arg(req("account", "Account name"))
                .arg(req("amount", "Amount in the account currency"))
                .arg(
                    Arg::new("category")
                        .long("category")
                        .required(true)
                        .value_parser(["must", "wants"])
                        .help("Spending category"),
                )
                .arg(opt("subcategory", "Subcategory, e.g. Groceries"))
                .arg(opt("description", "Description")),
        )
        .subcommand(
            Command::new("transfer")
                .about("Move money between two accounts")
                .arg(date_arg())
                .arg(req("from", "Source account"))
                .arg(req("to", "Destination account"))
                .arg(req("amount", "Amount in the source account currency"))
                .arg(opt("description", "Description")),
        )
        .subcommand(json_flags(
            Command::new("list")
                .about("List transactions, newest first")
                .arg(opt("month", "Only this month (YYYY-MM)"))
                .arg(opt("account", "Only this account"))
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_parser(clap::value_parser!(usize))
                        .help("Maximum rows"),
                ),
        ))
}

fn trade_cmd(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(date_arg())
        .arg(req("ticker", "Holding ticker"))
        .arg(req("account", "Paying or receiving account"))
        .arg(req("quantity", "Units"))
        .arg(req("price", "Price per unit"))
}

fn portfolio_cmd() -> Command {
    Command::new("portfolio")
        .about("Investment holdings")
        .subcommand_required(true)
        .subcommand(
            Command::new("add-holding")
                .about("Add a holding")
                .arg(opt("ticker", "Ticker; resolved from --isin when omitted"))
                .arg(opt("name", "Display name"))
                .arg(
                    Arg::new("type")
                        .long("type")
                        .required(true)
                        .value_parser(["stock", "etf", "crypto"])
                        .help("Investment type"),
                )
                .arg(req("currency", "Trading currency"))
                .arg(opt("isin", "ISIN"))
                .arg(
                    Arg::new("resolve")
                        .long("resolve")
                        .action(ArgAction::SetTrue)
                        .requires("isin")
                        .help("Look up name and ticker for the ISIN"),
                ),
        )
        .subcommand(json_flags(
            Command::new("list")
                .about("Holdings with quantity, return and allocation")
                .arg(opt("as-of", "Valuation date (default today)")),
        ))
        .subcommand(trade_cmd("buy", "Record a purchase"))
        .subcommand(trade_cmd("sell", "Record a sale"))
        .subcommand(
            Command::new("dividend")
                .about("Record a dividend")
                .arg(date_arg())
                .arg(req("ticker", "Holding ticker"))
                .arg(req("account", "Receiving account"))
                .arg(req("amount", "Cash received")),
        )
        .subcommand(
            Command::new("set-price")
                .about("Set or clear the stored current price")
                .arg(req("ticker", "Holding ticker"))
                .arg(opt("price", "New price; omit to clear")),
        )
        .subcommand(json_flags(
            Command::new("value")
                .about("Portfolio value at a date using the price fallback chain")
                .arg(opt("date", "Valuation date (default today)"))
                .arg(
                    Arg::new("type")
                        .long("type")
                        .value_parser(["stock", "etf", "crypto"])
                        .help("Only one asset class"),
                ),
        ))
        .subcommand(json_flags(
            Command::new("stats")
                .about("Portfolio totals, P/L, YTD and dividends")
                .arg(opt("as-of", "Valuation date (default today)")),
        ))
        .subcommand(
            Command::new("refresh-prices")
                .about("Refresh current prices and verify ISINs via the lookup service"),
        )
        .subcommand(
            Command::new("isin")
                .about("Look up name and ticker for an ISIN")
                .arg(Arg::new("isin").required(true).help("ISIN")),
        )
}

fn report_cmd() -> Command {
    Command::new("report")
        .about("Monthly reports and balances")
        .subcommand_required(true)
        .subcommand(json_flags(
            Command::new("monthly")
                .about("Generate (or show the saved) report for a month")
                .arg(Arg::new("month").required(true).help("Month (YYYY-MM)"))
                .arg(
                    Arg::new("refresh")
                        .long("refresh")
                        .action(ArgAction::SetTrue)
                        .help("Recompute and overwrite the saved summary"),
                ),
        ))
        .subcommand(json_flags(Command::new("list").about("Saved monthly summaries")))
        .subcommand(json_flags(
            Command::new("ytd")
                .about("Year-to-date portfolio return")
                .arg(opt("as-of", "Evaluation date (default today)")),
        ))
        .subcommand(json_flags(
            Command::new("balances")
                .about("Account balances")
                .arg(opt("as-of", "Cutoff date (default today)")),
        ))
}

fn fx_cmd() -> Command {
    Command::new("fx")
        .about("Reporting currency and exchange rates")
        .subcommand_required(true)
        .subcommand(
            Command::new("set-base")
                .about("Set the reporting currency")
                .arg(Arg::new("currency").required(true)),
        )
        .subcommand(
            Command::new("set-rate")
                .about("Store a rate: 1 BASE = RATE QUOTE")
                .arg(date_arg())
                .arg(req("base", "Base currency"))
                .arg(req("quote", "Quote currency"))
                .arg(req("rate", "Rate")),
        )
        .subcommand(
            Command::new("fetch")
                .about("Fetch ECB reference rates for every currency in use")
                .arg(
                    Arg::new("days")
                        .long("days")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("120")
                        .help("History window"),
                ),
        )
        .subcommand(Command::new("list").about("Latest stored rates"))
        .subcommand(
            Command::new("convert")
                .about("Convert an amount")
                .arg(date_arg())
                .arg(req("amount", "Amount"))
                .arg(req("from", "Source currency"))
                .arg(req("to", "Target currency")),
        )
}

pub fn build_cli() -> Command {
    Command::new("pocketfolio")
        .version(crate_version!())
        .about("Personal finance ledger with monthly reports and portfolio performance")
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(account_cmd())
        .subcommand(tx_cmd())
        .subcommand(portfolio_cmd())
        .subcommand(report_cmd())
        .subcommand(fx_cmd())
        .subcommand(Command::new("doctor").about("Check data for gaps"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn parses_report_refresh() {
        let m = build_cli()
            .try_get_matches_from(["pocketfolio", "report", "monthly", "2024-03", "--refresh", "--json"])
            .unwrap();
        let (_, report) = m.subcommand().unwrap();
        let (name, monthly) = report.subcommand().unwrap();
        assert_eq!(name, "monthly");
        assert!(monthly.get_flag("refresh"));
        assert!(monthly.get_flag("json"));
        assert_eq!(monthly.get_one::<String>("month").unwrap(), "2024-03");
    }

    #[test]
    fn transfer_requires_both_accounts() {
        let res = build_cli().try_get_matches_from([
            "pocketfolio", "tx", "transfer", "--date", "2024-01-01", "--from", "A", "--amount", "5",
        ]);
        assert!(res.is_err());
    }
}

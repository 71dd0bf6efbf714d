// In crates/market/src/catalog.rs

use core_types::{Instrument, InstrumentCategory};
use rust_decimal_macros::dec;

/// The instruments the simulated market is seeded with.
pub fn default_catalog() -> Vec<Instrument> {
    use InstrumentCategory::{Equity, Etf, Fund};

    vec![
        Instrument::seeded("RELIANCE", "Reliance Industries", dec!(2911.22), Equity, Some("Energy")),
        Instrument::seeded("TCS", "Tata Consultancy Svcs", dec!(3876.99), Equity, Some("IT")),
        Instrument::seeded("HDFCBANK", "HDFC Bank", dec!(1678.78), Equity, Some("Banking")),
        Instrument::seeded("ZOMATO", "Zomato Ltd", dec!(165.40), Equity, Some("Tech")),
        Instrument::seeded("PAYTM", "One 97 Communications", dec!(420.50), Equity, Some("Fintech")),
        Instrument::seeded("TATAMOTORS", "Tata Motors", dec!(980.40), Equity, Some("Auto")),
        Instrument::seeded("ITC", "ITC Limited", dec!(430.50), Equity, Some("FMCG")),
        Instrument::seeded("ADANIENT", "Adani Enterprises", dec!(3150.00), Equity, Some("Metals")),
        Instrument::seeded("INFY", "Infosys", dec!(1500.00), Equity, Some("IT")),
        Instrument::seeded("WIPRO", "Wipro", dec!(450.00), Equity, Some("IT")),
        Instrument::seeded("SBISMALL", "SBI Small Cap Fund", dec!(145.20), Fund, Some("Equity")),
        Instrument::seeded("HDFCTOP100", "HDFC Top 100 Fund", dec!(890.50), Fund, Some("Equity")),
        Instrument::seeded("PARAGFLEXI", "Parag Parikh Flexi Cap", dec!(65.30), Fund, Some("Equity")),
        Instrument::seeded("QUANTMID", "Quant Mid Cap Fund", dec!(210.15), Fund, Some("Equity")),
        Instrument::seeded("NIFTYBEES", "Nippon India Nifty 50", dec!(235.40), Etf, Some("Index")),
        Instrument::seeded("GOLDBEES", "Nippon India Gold", dec!(56.80), Etf, Some("Gold")),
        Instrument::seeded("BANKBEES", "Nippon India Bank", dec!(480.20), Etf, Some("Banking")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn catalog_symbols_are_unique_and_prices_positive() {
        let catalog = default_catalog();
        let symbols: HashSet<_> = catalog.iter().map(|i| i.symbol.clone()).collect();
        assert_eq!(symbols.len(), catalog.len());
        assert!(catalog.iter().all(|i| i.base_price > rust_decimal::Decimal::ZERO));
        assert!(catalog.iter().all(|i| i.current_price == i.base_price));
    }
}

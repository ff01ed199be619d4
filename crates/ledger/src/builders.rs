//! Line builders.
//!
//! A [`LineBuilder`] turns one [`SourceDocument`] into the debit/credit lines
//! of a single business event. Builders are registered per
//! `(SourceType, EventKind)` on the [`EngineBuilder`](crate::EngineBuilder);
//! the defaults below cover sales, purchases, payments and manual entries.
//!
//! Builders must return balanced lines. The posting gate checks again
//! anyway before anything is written.

use std::fmt;

use crate::{
    DocumentDetail, EngineError, LineDraft, PaymentDirection, PostingAccounts, ResultEngine,
    Settlement, SourceDocument,
};

pub trait LineBuilder: fmt::Debug + Send + Sync {
    fn build(
        &self,
        document: &SourceDocument,
        accounts: &PostingAccounts,
    ) -> ResultEngine<Vec<LineDraft>>;
}

/// Fails with `UnbalancedEntry` unless debits equal credits.
pub fn ensure_balanced(lines: &[LineDraft]) -> ResultEngine<()> {
    let overflow = || EngineError::InvalidAmount("line totals overflow".to_string());
    let mut debit: i64 = 0;
    let mut credit: i64 = 0;
    for line in lines {
        debit = debit.checked_add(line.debit).ok_or_else(overflow)?;
        credit = credit.checked_add(line.credit).ok_or_else(overflow)?;
    }
    if debit != credit {
        return Err(EngineError::UnbalancedEntry { debit, credit });
    }
    Ok(())
}

fn settlement_code(settlement: &Settlement, accounts: &PostingAccounts, on_credit: &str) -> String {
    match settlement {
        Settlement::OnCredit => on_credit.to_string(),
        Settlement::Cash => accounts.cash.clone(),
        Settlement::Bank { account_code } => account_code
            .clone()
            .unwrap_or_else(|| accounts.bank.clone()),
    }
}

/// Amounts of a trade document, checked for sign.
struct Trade<'a> {
    subtotal: i64,
    tax: i64,
    shipping: i64,
    withheld_tax: i64,
    cogs: i64,
    settlement: &'a Settlement,
}

impl Trade<'_> {
    fn has_sale_extras(&self) -> bool {
        self.shipping != 0 || self.withheld_tax != 0 || self.cogs != 0
    }
}

fn trade_amounts(document: &SourceDocument) -> ResultEngine<Trade<'_>> {
    let DocumentDetail::Trade {
        subtotal,
        tax,
        shipping,
        withheld_tax,
        cogs,
        settlement,
    } = &document.detail
    else {
        return Err(EngineError::InvalidAmount(format!(
            "{} requires trade details",
            document.label()
        )));
    };
    if *subtotal <= 0 {
        return Err(EngineError::InvalidAmount(
            "subtotal must be > 0".to_string(),
        ));
    }
    for (name, value) in [
        ("tax", tax),
        ("shipping", shipping),
        ("withheld tax", withheld_tax),
        ("cogs", cogs),
    ] {
        if *value < 0 {
            return Err(EngineError::InvalidAmount(format!("{name} must be >= 0")));
        }
    }
    Ok(Trade {
        subtotal: *subtotal,
        tax: *tax,
        shipping: *shipping,
        withheld_tax: *withheld_tax,
        cogs: *cogs,
        settlement,
    })
}

fn checked_total(amounts: &[i64]) -> ResultEngine<i64> {
    amounts
        .iter()
        .try_fold(0_i64, |acc, value| acc.checked_add(*value))
        .ok_or_else(|| EngineError::InvalidAmount("total overflow".to_string()))
}

/// Dr settlement (receivable, cash or bank) / Cr revenue / Cr output tax /
/// Cr shipping revenue.
///
/// Tax withheld by the customer is claimable, so it is debited to prepaid
/// tax and the settlement line shrinks by the same amount. A non-zero cost
/// of goods adds Dr COGS / Cr inventory.
#[derive(Debug, Default)]
pub struct SaleInvoiceBuilder;

impl LineBuilder for SaleInvoiceBuilder {
    fn build(
        &self,
        document: &SourceDocument,
        accounts: &PostingAccounts,
    ) -> ResultEngine<Vec<LineDraft>> {
        let trade = trade_amounts(document)?;
        let billed = checked_total(&[trade.subtotal, trade.tax, trade.shipping])?;
        if trade.withheld_tax >= billed {
            return Err(EngineError::InvalidAmount(format!(
                "withheld tax {} must be below the billed total {billed}",
                trade.withheld_tax
            )));
        }
        let settled = billed - trade.withheld_tax;
        let label = document.label();

        let mut lines = vec![
            LineDraft::debit(
                settlement_code(trade.settlement, accounts, &accounts.receivable),
                settled,
            )
            .memo(format!("Settlement for {label}")),
            LineDraft::credit(accounts.revenue.clone(), trade.subtotal)
                .memo(format!("Revenue for {label}")),
        ];
        if trade.tax > 0 {
            lines.push(
                LineDraft::credit(accounts.output_tax.clone(), trade.tax)
                    .memo(format!("Output tax for {label}")),
            );
        }
        if trade.shipping > 0 {
            lines.push(
                LineDraft::credit(accounts.shipping_revenue.clone(), trade.shipping)
                    .memo(format!("Shipping for {label}")),
            );
        }
        if trade.withheld_tax > 0 {
            lines.push(
                LineDraft::debit(accounts.prepaid_tax.clone(), trade.withheld_tax)
                    .memo(format!("Tax withheld on {label}")),
            );
        }
        if trade.cogs > 0 {
            lines.push(
                LineDraft::debit(accounts.cogs.clone(), trade.cogs)
                    .memo(format!("Cost of goods for {label}")),
            );
            lines.push(
                LineDraft::credit(accounts.inventory.clone(), trade.cogs)
                    .memo(format!("Inventory out for {label}")),
            );
        }

        ensure_balanced(&lines)?;
        Ok(lines)
    }
}

/// Dr inventory / Dr input tax / Cr settlement (payable, cash or bank).
#[derive(Debug, Default)]
pub struct PurchaseInvoiceBuilder;

impl LineBuilder for PurchaseInvoiceBuilder {
    fn build(
        &self,
        document: &SourceDocument,
        accounts: &PostingAccounts,
    ) -> ResultEngine<Vec<LineDraft>> {
        let trade = trade_amounts(document)?;
        if trade.has_sale_extras() {
            return Err(EngineError::InvalidAmount(format!(
                "{label}: shipping, withheld tax and cogs only apply to sales",
                label = document.label()
            )));
        }
        let total = checked_total(&[trade.subtotal, trade.tax])?;
        let label = document.label();

        let mut lines = vec![
            LineDraft::debit(accounts.inventory.clone(), trade.subtotal)
                .memo(format!("Inventory for {label}")),
        ];
        if trade.tax > 0 {
            lines.push(
                LineDraft::debit(accounts.input_tax.clone(), trade.tax)
                    .memo(format!("Input tax for {label}")),
            );
        }
        lines.push(
            LineDraft::credit(
                settlement_code(trade.settlement, accounts, &accounts.payable),
                total,
            )
            .memo(format!("Settlement for {label}")),
        );

        ensure_balanced(&lines)?;
        Ok(lines)
    }
}

/// Receipts: Dr cash/bank / Cr receivable. Disbursements: Dr payable / Cr
/// cash/bank.
#[derive(Debug, Default)]
pub struct PaymentBuilder;

impl LineBuilder for PaymentBuilder {
    fn build(
        &self,
        document: &SourceDocument,
        accounts: &PostingAccounts,
    ) -> ResultEngine<Vec<LineDraft>> {
        let DocumentDetail::Payment {
            amount,
            direction,
            settlement,
        } = &document.detail
        else {
            return Err(EngineError::InvalidAmount(format!(
                "{} requires payment details",
                document.label()
            )));
        };
        if *amount <= 0 {
            return Err(EngineError::InvalidAmount(
                "payment amount must be > 0".to_string(),
            ));
        }
        if *settlement == Settlement::OnCredit {
            return Err(EngineError::InvalidAmount(
                "a payment must be settled in cash or bank".to_string(),
            ));
        }
        let label = document.label();
        let money = settlement_code(settlement, accounts, &accounts.cash);

        let lines = match direction {
            PaymentDirection::Receipt => vec![
                LineDraft::debit(money, *amount).memo(format!("Received for {label}")),
                LineDraft::credit(accounts.receivable.clone(), *amount)
                    .memo(format!("Reduce receivable for {label}")),
            ],
            PaymentDirection::Disbursement => vec![
                LineDraft::debit(accounts.payable.clone(), *amount)
                    .memo(format!("Reduce payable for {label}")),
                LineDraft::credit(money, *amount).memo(format!("Paid for {label}")),
            ],
        };

        ensure_balanced(&lines)?;
        Ok(lines)
    }
}

/// Passes the document's own lines through.
#[derive(Debug, Default)]
pub struct ManualBuilder;

impl LineBuilder for ManualBuilder {
    fn build(
        &self,
        document: &SourceDocument,
        _accounts: &PostingAccounts,
    ) -> ResultEngine<Vec<LineDraft>> {
        let DocumentDetail::Manual { lines } = &document.detail else {
            return Err(EngineError::InvalidAmount(format!(
                "{} requires explicit lines",
                document.label()
            )));
        };
        ensure_balanced(lines)?;
        Ok(lines.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::{DocumentStatus, SourceType};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn sale_on_credit_debits_receivable() {
        let sale = SourceDocument::sale("S-1", DocumentStatus::Invoiced, date(), 1_000_000);
        let lines = SaleInvoiceBuilder
            .build(&sale, &PostingAccounts::default())
            .unwrap();

        assert_eq!(
            lines
                .iter()
                .map(|l| (l.account_code.as_str(), l.debit, l.credit))
                .collect::<Vec<_>>(),
            vec![("1201", 1_000_000, 0), ("4101", 0, 1_000_000)]
        );
    }

    #[test]
    fn sale_with_tax_credits_output_tax() {
        let sale = SourceDocument::sale("S-2", DocumentStatus::Paid, date(), 1_000)
            .tax(110)
            .settlement(Settlement::Bank {
                account_code: Some("1105".to_string()),
            });
        let lines = SaleInvoiceBuilder
            .build(&sale, &PostingAccounts::default())
            .unwrap();

        assert_eq!(lines[0].account_code, "1105");
        assert_eq!(lines[0].debit, 1_110);
        assert_eq!(lines[2].account_code, "2103");
        assert_eq!(lines[2].credit, 110);
    }

    #[test]
    fn sale_posts_shipping_withheld_tax_and_cogs() {
        let sale = SourceDocument::sale("S-3", DocumentStatus::Invoiced, date(), 1_000)
            .tax(110)
            .shipping(50)
            .withheld_tax(20)
            .cogs(600);
        let lines = SaleInvoiceBuilder
            .build(&sale, &PostingAccounts::default())
            .unwrap();

        assert_eq!(
            lines
                .iter()
                .map(|l| (l.account_code.as_str(), l.debit, l.credit))
                .collect::<Vec<_>>(),
            vec![
                ("1201", 1_140, 0),
                ("4101", 0, 1_000),
                ("2103", 0, 110),
                ("4102", 0, 50),
                ("1114", 20, 0),
                ("5101", 600, 0),
                ("1301", 0, 600),
            ]
        );
    }

    #[test]
    fn withheld_tax_cannot_swallow_the_invoice() {
        let sale =
            SourceDocument::sale("S-4", DocumentStatus::Invoiced, date(), 100).withheld_tax(100);
        let err = SaleInvoiceBuilder
            .build(&sale, &PostingAccounts::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }

    #[test]
    fn purchase_rejects_sale_only_amounts() {
        let purchase =
            SourceDocument::purchase("P-2", DocumentStatus::Approved, date(), 500).cogs(10);
        assert!(matches!(
            PurchaseInvoiceBuilder.build(&purchase, &PostingAccounts::default()),
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[test]
    fn purchase_credits_payable_for_total() {
        let purchase =
            SourceDocument::purchase("P-1", DocumentStatus::Approved, date(), 500).tax(55);
        let lines = PurchaseInvoiceBuilder
            .build(&purchase, &PostingAccounts::default())
            .unwrap();

        let payable = lines.last().unwrap();
        assert_eq!(payable.account_code, "2101");
        assert_eq!(payable.credit, 555);
    }

    #[test]
    fn disbursement_debits_payable() {
        let payment = SourceDocument::payment(
            "PAY-1",
            DocumentStatus::Completed,
            date(),
            300,
            PaymentDirection::Disbursement,
        );
        let lines = PaymentBuilder
            .build(&payment, &PostingAccounts::default())
            .unwrap();
        assert_eq!(lines[0].account_code, "2101");
        assert_eq!(lines[1].account_code, "1101");
    }

    #[test]
    fn manual_lines_must_balance() {
        let adjustment = SourceDocument::manual(
            SourceType::Adjustment,
            "ADJ-1",
            DocumentStatus::Approved,
            date(),
            vec![LineDraft::debit("6101", 100), LineDraft::credit("1101", 90)],
        );
        let err = ManualBuilder
            .build(&adjustment, &PostingAccounts::default())
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::UnbalancedEntry {
                debit: 100,
                credit: 90
            }
        );
    }

    #[test]
    fn builder_rejects_mismatched_detail() {
        let payment = SourceDocument::payment(
            "PAY-2",
            DocumentStatus::Completed,
            date(),
            10,
            PaymentDirection::Receipt,
        );
        assert!(
            SaleInvoiceBuilder
                .build(&payment, &PostingAccounts::default())
                .is_err()
        );
    }
}

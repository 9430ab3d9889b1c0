use domain::upstream::{Group, Member, Transfer, User};
use library::transport::{MailMessage, Mailbox};

fn transfer_url(app_url: &str, transfer: &Transfer) -> String {
    format!(
        "{}/groups/{}/transactions/{}",
        app_url.trim_end_matches('/'),
        transfer.currency.code,
        transfer.id
    )
}

fn transfer_details(transfer: &Transfer) -> String {
    let mut details = format!(
        "From: {}\nTo: {}\nAmount: {}",
        transfer.payer.code,
        transfer.payee.code,
        transfer.currency.format(transfer.amount)
    );

    if !transfer.meta.is_empty() {
        details.push_str(&format!("\nDescription: {}", transfer.meta));
    }

    details
}

/// Notice to a user of the paying member
pub fn payment_sent(
    user: &User,
    payer: &Member,
    payee: &Member,
    transfer: &Transfer,
    app_url: &str,
) -> MailMessage {
    let amount = transfer.currency.format(transfer.amount);

    MailMessage {
        to: Mailbox::named(&user.email, &payer.name),
        subject: format!("Payment of {} sent", amount),
        text: format!(
            "Hello {},\n\nYou have paid {} to {}.\n\n{}\n\nView transaction: {}\n",
            payer.name,
            amount,
            payee.name,
            transfer_details(transfer),
            transfer_url(app_url, transfer)
        ),
    }
}

/// Notice to a user of the receiving member
pub fn payment_received(
    user: &User,
    payer: &Member,
    payee: &Member,
    transfer: &Transfer,
    app_url: &str,
) -> MailMessage {
    let amount = transfer.currency.format(transfer.amount);

    MailMessage {
        to: Mailbox::named(&user.email, &payee.name),
        subject: format!("Payment of {} received", amount),
        text: format!(
            "Hello {},\n\nYou have received {} from {}.\n\n{}\n\nView transaction: {}\n",
            payee.name,
            amount,
            payer.name,
            transfer_details(transfer),
            transfer_url(app_url, transfer)
        ),
    }
}

/// Notice to a group administrator about a pending membership
pub fn member_requested(admin: &User, group: &Group, member: &Member, app_url: &str) -> MailMessage {
    MailMessage {
        to: Mailbox {
            email: admin.email.clone(),
            name: None,
        },
        subject: format!("New membership request in {}", group.name),
        text: format!(
            "Hello,\n\n{} has requested to join {}.\n\nReview the request: {}/groups/{}/members/{}\n",
            member.name,
            group.name,
            app_url.trim_end_matches('/'),
            group.code,
            member.code
        ),
    }
}

/// Notice to a group administrator once the group went live
pub fn group_activated(admin: &User, group: &Group, app_url: &str) -> MailMessage {
    MailMessage {
        to: Mailbox {
            email: admin.email.clone(),
            name: None,
        },
        subject: format!("{} is now active", group.name),
        text: format!(
            "Hello,\n\nThe group {} has been activated and is now open to its members.\n\nVisit the group: {}/groups/{}\n",
            group.name,
            app_url.trim_end_matches('/'),
            group.code
        ),
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use domain::upstream::{Account, Currency};
    use pretty_assertions::assert_eq;

    fn member(name: &str) -> Member {
        Member {
            id: name.to_lowercase(),
            code: format!("GRP1{}", name.to_uppercase()),
            name: name.into(),
            account: None,
        }
    }

    fn transfer() -> Transfer {
        Transfer {
            id: "t1".into(),
            amount: 12345,
            meta: "Bread".into(),
            state: "committed".into(),
            created: None,
            payer: Account {
                id: "a1".into(),
                code: "GRP10001".into(),
            },
            payee: Account {
                id: "a2".into(),
                code: "GRP10002".into(),
            },
            currency: Currency {
                code: "GRP1".into(),
                symbol: "ℏ".into(),
                decimals: 2,
                scale: 4,
                ..Default::default()
            },
        }
    }

    fn user() -> User {
        User {
            id: "u1".into(),
            email: "alice@example.com".into(),
            members: vec![],
            settings: None,
        }
    }

    #[test]
    fn describe_sent_payments() {
        let message = payment_sent(
            &user(),
            &member("Alice"),
            &member("Bob"),
            &transfer(),
            "https://app.example.com/",
        );

        assert_eq!(message.to, Mailbox::named("alice@example.com", "Alice"));
        assert_eq!(message.subject, "Payment of 1.23 ℏ sent");
        assert!(message.text.contains("You have paid 1.23 ℏ to Bob."));
        assert!(message.text.contains("Description: Bread"));
        assert!(message
            .text
            .contains("https://app.example.com/groups/GRP1/transactions/t1"));
    }

    #[test]
    fn describe_received_payments() {
        let message = payment_received(
            &user(),
            &member("Alice"),
            &member("Bob"),
            &transfer(),
            "https://app.example.com",
        );

        assert_eq!(message.to.name.as_deref(), Some("Bob"));
        assert!(message.text.starts_with("Hello Bob,"));
        assert!(message.text.contains("received 1.23 ℏ from Alice"));
    }
}

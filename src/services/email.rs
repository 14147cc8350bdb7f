use anyhow::Context;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use uuid::Uuid;

use crate::config::Config;

pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    /// Returns None if SMTP is not fully configured.
    pub fn new(config: &Config) -> Option<Self> {
        let host = config.smtp_host.as_deref()?;
        let username = config.smtp_username.clone()?;
        let password = config.smtp_password.clone()?;
        let from_addr = config.smtp_from.as_deref()?;

        let port = config.smtp_port.unwrap_or(587);
        let creds = Credentials::new(username, password);

        let transport = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .ok()?
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .ok()?
                .credentials(creds)
                .build()
        };

        let from: Mailbox = from_addr.parse().ok()?;

        Some(Self { transport, from })
    }

    // ─── Private helpers ─────────────────────────────────────────────────────

    fn new_message_id(&self) -> String {
        format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain())
    }

    /// Wraps inner HTML content in a consistent branded email layout.
    fn wrap_html(title: &str, content: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width,initial-scale=1">
  <title>{title}</title>
</head>
<body style="margin:0;padding:0;background-color:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Helvetica,Arial,sans-serif">
  <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="background-color:#f1f5f9;padding:40px 16px">
    <tr>
      <td align="center">
        <table role="presentation" width="100%" cellpadding="0" cellspacing="0" style="max-width:520px">
          <tr>
            <td align="center" style="padding-bottom:28px">
              <p style="margin:0;font-size:20px;font-weight:700;color:#0f172a;text-align:center">{title}</p>
            </td>
          </tr>
          <tr>
            <td style="background:#ffffff;border-radius:12px;padding:36px 32px">
              {content}
            </td>
          </tr>
        </table>
      </td>
    </tr>
  </table>
</body>
</html>"#
        )
    }

    async fn send_email(
        &self,
        from: Mailbox,
        to: Mailbox,
        subject: &str,
        text: &str,
        html: &str,
    ) -> anyhow::Result<()> {
        let email = Message::builder()
            .message_id(Some(self.new_message_id()))
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    ),
            )
            .context("Failed to build email message")?;

        self.transport
            .send(email)
            .await
            .context("Failed to send email")?;

        Ok(())
    }

    // ─── Public methods ───────────────────────────────────────────────────────

    /// Invitation to create an account under a facility. Used both for staff
    /// invitations and as the credential-issuance step of facility approval.
    pub async fn send_invitation(
        &self,
        to_email: &str,
        invite_url: &str,
        facility_name: &str,
        role: &str,
    ) -> anyhow::Result<()> {
        let from = Mailbox::new(Some(facility_name.to_string()), self.from.email.clone());
        let to: Mailbox = to_email.parse()?;

        let role_label = match role {
            "facility_admin" => "Facility Administrator",
            "therapist" => "Therapist",
            _ => "Parent",
        };

        let subject = format!("Invitation to join {facility_name} on UnifiedCare");

        let text = format!(
            "You have been invited to join {facility_name} as {role_label}.\n\n\
            Click the link to create your account and choose your password:\n\
            {invite_url}\n\n\
            This link expires in 7 days."
        );

        let content = format!(
            r#"<h1 style="margin:0 0 8px 0;font-size:22px;font-weight:700;color:#0f172a">You're invited</h1>
<p style="margin:0 0 28px 0;font-size:15px;color:#64748b;line-height:1.6">You have been invited to join <strong style="color:#334155">{facility_name}</strong> as <strong style="color:#334155">{role_label}</strong>.<br><br>Create your account and choose your own password by clicking the button below.</p>
<table role="presentation" cellpadding="0" cellspacing="0" style="margin-bottom:28px">
  <tr>
    <td style="border-radius:8px;background:#2563eb">
      <a href="{invite_url}" style="display:inline-block;padding:13px 28px;color:#ffffff;text-decoration:none;font-weight:600;font-size:15px;border-radius:8px">Create my account</a>
    </td>
  </tr>
</table>
<p style="margin:0;font-size:13px;color:#94a3b8;border-top:1px solid #f1f5f9;padding-top:20px;line-height:1.5">This link expires in <strong style="color:#64748b">7 days</strong>.</p>"#
        );

        let html = Self::wrap_html(facility_name, &content);
        self.send_email(from, to, &subject, &text, &html).await
    }

    pub async fn send_password_reset(
        &self,
        to_email: &str,
        to_name: &str,
        reset_url: &str,
        facility_name: &str,
    ) -> anyhow::Result<()> {
        let from = Mailbox::new(Some(facility_name.to_string()), self.from.email.clone());
        let to: Mailbox = format!("{to_name} <{to_email}>")
            .parse()
            .or_else(|_| to_email.parse())?;

        let subject = format!("Password reset — {facility_name}");

        let text = format!(
            "Hello {to_name},\n\n\
            You requested a password reset for {facility_name}.\n\n\
            Click this link to choose a new password (valid for 1 hour):\n\
            {reset_url}\n\n\
            If you did not make this request, ignore this email.\n\n\
            {facility_name}"
        );

        let content = format!(
            r#"<h1 style="margin:0 0 8px 0;font-size:22px;font-weight:700;color:#0f172a">Password reset</h1>
<p style="margin:0 0 28px 0;font-size:15px;color:#64748b;line-height:1.6">Hello <strong style="color:#334155">{to_name}</strong>,<br><br>You requested a password reset. Click the button below to choose a new one.</p>
<table role="presentation" cellpadding="0" cellspacing="0" style="margin-bottom:28px">
  <tr>
    <td style="border-radius:8px;background:#2563eb">
      <a href="{reset_url}" style="display:inline-block;padding:13px 28px;color:#ffffff;text-decoration:none;font-weight:600;font-size:15px;border-radius:8px">Reset my password</a>
    </td>
  </tr>
</table>
<p style="margin:0;font-size:13px;color:#94a3b8;border-top:1px solid #f1f5f9;padding-top:20px;line-height:1.5">This link expires in <strong style="color:#64748b">1 hour</strong>. If you did not make this request, ignore this email.</p>"#
        );

        let html = Self::wrap_html(facility_name, &content);
        self.send_email(from, to, &subject, &text, &html).await
    }

    /// Approval notice sent to a facility's contact address, carrying the
    /// admin-account invitation link.
    pub async fn send_facility_approved(
        &self,
        to_email: &str,
        facility_name: &str,
        invite_url: &str,
    ) -> anyhow::Result<()> {
        let from = Mailbox::new(Some("UnifiedCare".to_string()), self.from.email.clone());
        let to: Mailbox = to_email.parse()?;

        let subject = format!("{facility_name} has been approved on UnifiedCare");

        let text = format!(
            "Good news — {facility_name} has been approved on UnifiedCare.\n\n\
            Set up your administrator account and choose your password here:\n\
            {invite_url}\n\n\
            This link expires in 7 days."
        );

        let content = format!(
            r#"<h1 style="margin:0 0 8px 0;font-size:22px;font-weight:700;color:#0f172a">Your facility is approved</h1>
<p style="margin:0 0 28px 0;font-size:15px;color:#64748b;line-height:1.6"><strong style="color:#334155">{facility_name}</strong> has been approved on UnifiedCare. Set up your administrator account by clicking the button below.</p>
<table role="presentation" cellpadding="0" cellspacing="0" style="margin-bottom:28px">
  <tr>
    <td style="border-radius:8px;background:#16a34a">
      <a href="{invite_url}" style="display:inline-block;padding:13px 28px;color:#ffffff;text-decoration:none;font-weight:600;font-size:15px;border-radius:8px">Set up my account</a>
    </td>
  </tr>
</table>
<p style="margin:0;font-size:13px;color:#94a3b8;border-top:1px solid #f1f5f9;padding-top:20px;line-height:1.5">This link expires in <strong style="color:#64748b">7 days</strong>.</p>"#
        );

        let html = Self::wrap_html("UnifiedCare", &content);
        self.send_email(from, to, &subject, &text, &html).await
    }
}

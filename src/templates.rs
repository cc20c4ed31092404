//! Branded transactional email templates.
//!
//! Every template renders a subject, an HTML body wrapped in the SpendNote
//! card layout, and a plain-text alternative. Values interpolated into HTML
//! are escaped; the text body uses them verbatim.

use crate::models::invite::MemberRole;

/// Rendered email content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Escape text for use in HTML content and attribute values.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(default)
}

fn button(href: &str, label: &str) -> String {
    format!(
        r#"<div style="margin:18px 0 16px;">
        <a href="{href}" style="display:inline-block;background:#059669;color:#fff;text-decoration:none;padding:10px 14px;border-radius:10px;font-weight:800;">{label}</a>
      </div>"#
    )
}

fn app_card(title: &str, subtitle: &str, body_html: &str) -> String {
    format!(
        r#"
  <div style="font-family:Arial,Helvetica,sans-serif;font-size:14px;line-height:1.6;color:#111;background:#f8fafc;padding:24px;">
    <div style="max-width:560px;margin:0 auto;border:1px solid #e5e7eb;border-radius:14px;overflow:hidden;background:#ffffff;">
      <div style="background:linear-gradient(135deg,#059669,#10b981);padding:18px 20px;color:#fff;">
        <div style="font-size:16px;font-weight:800;letter-spacing:0.2px;">SpendNote</div>
        <div style="font-size:20px;font-weight:900;margin-top:4px;">{title}</div>
        <div style="font-size:13px;opacity:0.95;margin-top:4px;">{subtitle}</div>
      </div>
      <div style="padding:18px 20px;">{body_html}</div>
      <div style="padding:14px 20px;border-top:1px solid #e5e7eb;color:#6b7280;font-size:12px;">
        Cash handoff documentation only. Not a tax or accounting tool.<br>
        &copy; SpendNote • <a href="https://spendnote.app" style="color:#6b7280;">spendnote.app</a>
      </div>
    </div>
  </div>
"#
    )
}

/// Invitation to join a team.
pub struct InviteEmail<'a> {
    /// Who sent the invite, e.g. a name or address. Blank renders as "A team member".
    pub inviter_line: &'a str,
    pub role: MemberRole,
    pub invite_link: &'a str,
    pub subject: &'a str,
}

impl InviteEmail<'_> {
    pub fn render(&self) -> RenderedEmail {
        let inviter_plain = or_default(Some(self.inviter_line), "A team member");
        let inviter = escape_html(inviter_plain);
        let role = if self.role == MemberRole::Admin { "Admin" } else { "User" };
        let link = escape_html(self.invite_link);

        let body = format!(
            r#"
      <p style="margin:0 0 10px;">{inviter} invited you to join their SpendNote team.</p>
      <p style="margin:0 0 14px;">Role: <strong>{role}</strong></p>
      {button}
      <p style="margin:0 0 10px;color:#374151;">If the button doesn’t work, copy and paste this link into your browser:</p>
      <p style="margin:0 0 16px;"><a href="{link}" style="color:#1d4ed8;word-break:break-all;">{link}</a></p>
      <p style="margin:0;color:#6b7280;">If you didn’t expect this invite, you can ignore this email.</p>
    "#,
            button = button(&link, "Accept invitation"),
        );

        RenderedEmail {
            subject: or_default(Some(self.subject), "You have been invited to SpendNote").to_string(),
            html: app_card("You’ve been invited", "Join your team in SpendNote", &body),
            text: format!(
                "SpendNote invitation\n\n{inviter_plain} invited you to join SpendNote as {role}.\n\nAccept invitation:\n{}\n\nIf you didn’t expect this invite, you can ignore this email.",
                self.invite_link
            ),
        }
    }
}

/// Sent once a new account has been created.
pub struct WelcomeEmail<'a> {
    pub full_name: Option<&'a str>,
    pub login_url: &'a str,
}

impl WelcomeEmail<'_> {
    pub fn render(&self) -> RenderedEmail {
        let name_plain = or_default(self.full_name, "there");
        let name = escape_html(name_plain);
        let login_url = escape_html(or_default(
            Some(self.login_url),
            "https://spendnote.app/spendnote-login.html",
        ));

        let body = format!(
            r#"
      <p style="margin:0 0 10px;">Hi {name}, your SpendNote account has been created successfully.</p>
      <p style="margin:0 0 14px;">You can now log in, create your first cash box, and start documenting cash handoffs.</p>
      {button}
      <p style="margin:0;color:#6b7280;">Need help? Reply to this email and we’ll help you get started.</p>
    "#,
            button = button(&login_url, "Open SpendNote"),
        );

        RenderedEmail {
            subject: "Welcome to SpendNote".to_string(),
            html: app_card("Welcome to SpendNote", "Your account is ready", &body),
            text: format!(
                "Welcome to SpendNote\n\nHi {name_plain}, your account is ready.\nOpen SpendNote: {}",
                self.login_url
            ),
        }
    }
}

/// Asks a new user to confirm their address.
pub struct EmailConfirmation<'a> {
    pub full_name: Option<&'a str>,
    pub confirm_url: &'a str,
}

impl EmailConfirmation<'_> {
    pub fn render(&self) -> RenderedEmail {
        let name_plain = or_default(self.full_name, "there");
        let name = escape_html(name_plain);
        let confirm_url = escape_html(self.confirm_url.trim());

        let body = format!(
            r#"
      <p style="margin:0 0 10px;">Hi {name}, please confirm your email address to activate your SpendNote account.</p>
      {button}
      <p style="margin:0 0 10px;color:#374151;">If the button doesn’t work, use this link:</p>
      <p style="margin:0 0 16px;"><a href="{confirm_url}" style="color:#1d4ed8;word-break:break-all;">{confirm_url}</a></p>
      <p style="margin:0;color:#6b7280;">If you didn’t create this account, you can safely ignore this email.</p>
    "#,
            button = button(&confirm_url, "Confirm email"),
        );

        RenderedEmail {
            subject: "Confirm your SpendNote email address".to_string(),
            html: app_card("Confirm your email", "One quick step to activate your account", &body),
            text: format!(
                "Confirm your SpendNote email\n\nHi {name_plain}, confirm your account:\n{}",
                self.confirm_url.trim()
            ),
        }
    }
}

/// Tells a team admin that an invite was accepted.
pub struct InviteAcceptedEmail<'a> {
    pub admin_name: Option<&'a str>,
    pub accepted_user_name: Option<&'a str>,
    pub accepted_user_email: &'a str,
    pub org_name: Option<&'a str>,
    pub team_url: &'a str,
}

impl InviteAcceptedEmail<'_> {
    pub fn render(&self) -> RenderedEmail {
        let admin_plain = or_default(self.admin_name, "there");
        let org_plain = or_default(self.org_name, "your team");
        let who_plain = self
            .accepted_user_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(self.accepted_user_email);

        let admin = escape_html(admin_plain);
        let accepted_user = escape_html(or_default(self.accepted_user_name, "A user"));
        let accepted_email = escape_html(self.accepted_user_email);
        let org = escape_html(org_plain);
        let team_url = escape_html(or_default(
            Some(self.team_url),
            "https://spendnote.app/spendnote-team.html",
        ));

        let body = format!(
            r#"
      <p style="margin:0 0 10px;">Hi {admin},</p>
      <p style="margin:0 0 10px;"><strong>{accepted_user}</strong> ({accepted_email}) accepted your invitation and joined {org}.</p>
      {button}
      <p style="margin:0;color:#6b7280;">You can now manage cash box access from Team settings.</p>
    "#,
            button = button(&team_url, "Open team settings"),
        );

        RenderedEmail {
            subject: format!(
                "{} accepted your SpendNote invite",
                or_default(Some(who_plain), "A user")
            ),
            html: app_card("Invite accepted", "A team member is now active", &body),
            text: format!(
                "Invite accepted\n\nHi {admin_plain}, {who_plain} accepted your invitation and joined {org_plain}.\nOpen team settings: {}",
                self.team_url
            ),
        }
    }
}

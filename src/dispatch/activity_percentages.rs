//! Income share per economic activity.
//!
//! Declares the whole income under a single personal-services activity.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::{HandlerResult, Obligation};
use crate::session::Session;

use super::profile_update::{ProfileForm, fields, raw, submit_profile_update, text};
use super::{HandlerContext, HandlerFailure, ObligationHandler, expect_profile_field};

pub(crate) const FIELD: &str = "porcentajes_actividades";

const ACTIVITY_NAME: &str = "96099 - OTRAS ACTIVIDADES DE SERVICIOS PERSONALES N.C.P.";
const ACTIVITY_CODE: &str = "C4_96099";

pub struct ActivityPercentagesHandler;

#[async_trait]
impl ObligationHandler for ActivityPercentagesHandler {
    fn name(&self) -> &str {
        "activity-percentages"
    }

    async fn resolve(
        &self,
        session: &mut Session,
        ctx: &HandlerContext,
        obligation: &Obligation,
    ) -> Result<HandlerResult, HandlerFailure> {
        let link = expect_profile_field(self.name(), obligation)?;
        submit_profile_update(self, session, ctx, link).await
    }
}

impl ProfileForm for ActivityPercentagesHandler {
    fn category(&self) -> &'static str {
        "PORCENTAJES_ACTIVIDAD"
    }

    fn page_marker(&self) -> &'static str {
        "Porcentajes de Ingreso por Actividades Económicas"
    }

    fn capture(&self, recovered: &Value, ctx: &HandlerContext) -> Map<String, Value> {
        let general = &recovered["generales"];
        let year = ctx.today.format("%Y").to_string();

        fields(vec![
            ("formaJuridica", "FISICO".into()),
            ("ruc", ctx.profile.ruc.as_str().into()),
            ("categoria", self.category().into()),
            ("generalesFechaSolicitud", ctx.today.format("%d/%m/%Y").to_string().into()),
            ("generalesTipoInscripcion", "SOLICITADA".into()),
            ("operacionesFechaInicio", text(general, "operacionesFechaInicio")),
            ("operacionesMesCierreHistorico", raw(general, "operacionesMesCierreHistorico")),
            ("nombreCompleto", text(general, "nombreCompleto")),
            ("generalesNombreCompleto", text(general, "generalesNombreCompleto")),
            ("edicionPorcentajes", text(general, "edicionPorcentajes")),
            ("generalesPorcentajesActividadesAnho", year.as_str().into()),
            ("generalesPorcentajesActividadesAnho_", year.into()),
            ("domicilioTelefono01", "".into()),
            ("domicilioTelefono02", "".into()),
            ("domicilioCelular01", "".into()),
            ("domicilioCelular02", "".into()),
            ("porcentajeActividadNombre.1", ACTIVITY_NAME.into()),
            ("porcentajeActividad.1", ACTIVITY_CODE.into()),
            ("porcentajeActividadValor.1", 100.into()),
        ])
    }

    fn verification_fields(&self, _recovered: &Value, _ctx: &HandlerContext) -> Option<Map<String, Value>> {
        None
    }

    fn success_message(&self) -> &'static str {
        "Info on the percentage of income from economic activity updated successfully!"
    }
}

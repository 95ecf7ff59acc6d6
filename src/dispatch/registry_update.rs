//! Taxpayer registry update ("Registro de Contribuyentes").
//!
//! Re-submits the recovered general and address data unchanged so the
//! portal records the profile as reviewed.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::{HandlerResult, Obligation};
use crate::session::Session;

use super::profile_update::{ProfileForm, fields, raw, submit_profile_update, text};
use super::{HandlerContext, HandlerFailure, ObligationHandler, expect_profile_field};

pub(crate) const FIELD: &str = "registro_de_contribuyentes";

pub struct RegistryUpdateHandler;

#[async_trait]
impl ObligationHandler for RegistryUpdateHandler {
    fn name(&self) -> &str {
        "registry-update"
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

impl ProfileForm for RegistryUpdateHandler {
    fn category(&self) -> &'static str {
        "EDICION"
    }

    fn page_marker(&self) -> &'static str {
        "Actualización de Contribuyente"
    }

    fn capture(&self, recovered: &Value, ctx: &HandlerContext) -> Map<String, Value> {
        let general = &recovered["generales"];
        let address = &recovered["domicilio"];
        let ruc = ctx.profile.ruc.as_str();
        let today = ctx.today.format("%d/%m/%Y").to_string();
        let mobile = format!(
            "({}){}",
            text(address, "domicilioCelular01Prefijo").as_str().unwrap_or_default(),
            text(address, "domicilioCelular01Sufijo").as_str().unwrap_or_default(),
        );

        fields(vec![
            ("formaJuridica", "FISICO".into()),
            ("ruc", ruc.into()),
            ("categoria", self.category().into()),
            ("generalesFormaJuridica", "FISICO".into()),
            ("generalesFechaSolicitud", today.into()),
            ("generalesTipoInscripcion", "SOLICITADA".into()),
            ("categoriaContribuyente", "PEQUENO".into()),
            ("generalesTipoDocumento", text(general, "generalesTipoDocumento").into()),
            ("operacionesMesCierreVigente", raw(general, "operacionesMesCierreHistorico").into()),
            ("nombreCompleto", text(general, "nombreCompleto").into()),
            ("generalesPaisDocumento", "PY".into()),
            ("operacionesMesCierre", raw(general, "operacionesMesCierreHistorico").into()),
            ("ley285", text(general, "ley285").into()),
            ("generalesPaisDocumento_", "Paraguay".into()),
            ("generalesDv", ctx.profile.dv.as_str().into()),
            ("generalesNumeroDocumento", ruc.into()),
            ("declaraInternet", text(general, "declaraInternet").into()),
            ("operacionesImportador", text(general, "operacionesImportador").into()),
            ("generalesNombres", text(general, "generalesNombres").into()),
            ("generalesCorreo01", text(general, "generalesCorreo01").into()),
            ("operacionesFechaInicio", text(general, "operacionesFechaInicio").into()),
            ("operacionesExportador", text(general, "operacionesExportador").into()),
            ("tipoInscripcion", "SOLICITADA".into()),
            ("generalesApellido01", text(general, "generalesApellido01").into()),
            ("operacionesFuncionarios", raw(general, "operacionesFuncionarios").into()),
            ("generalesEstado", text(general, "generalesEstado").into()),
            ("generalesRuc", ruc.into()),
            ("generalesRegionalTexto", text(general, "generalesRegionalTexto").into()),
            ("fechaInicioActividad", text(general, "operacionesFechaInicio").into()),
            ("generalesRegional", raw(general, "generalesRegional").into()),
            ("generalesTipoDocumento_", text(general, "generalesTipoDocumento").into()),
            ("operacionesMesCierre_", "DICIEMBRE".into()),
            ("generalesCiudadanoActualizado", text(general, "generalesCiudadanoActualizado").into()),
            ("operacionesMesCierreHistorico", raw(general, "operacionesMesCierreHistorico").into()),
            ("generalesNombreCompleto", text(general, "generalesNombreCompleto").into()),
            ("generalesFechaNacimiento", text(general, "generalesFechaNacimiento").into()),
            ("domicilioTipoVia", text(address, "domicilioTipoVia").into()),
            ("domicilioCelular01Sufijo", text(address, "domicilioCelular01Sufijo").into()),
            ("domicilioReferencias", text(address, "domicilioReferencias").into()),
            ("domicilioCelular01Prefijo", text(address, "domicilioCelular01Prefijo").into()),
            ("domicilioCelular01", mobile.into()),
            ("domicilioDistrito_", text(address, "domicilioDistrito_").into()),
            ("domicilioLatitud", text(address, "domicilioLatitud").into()),
            ("domicilioDepartamento_", text(address, "domicilioDepartamento_").into()),
            ("domicilioBarrio_", text(address, "domicilioBarrio_").into()),
            ("domicilioTipoVia_", text(address, "domicilioTipoVia").into()),
            ("domicilioNombreVia", text(address, "domicilioNombreVia").into()),
            ("domicilioTipoInmueble", text(address, "domicilioTipoInmueble").into()),
            ("domicilioNumeroPuerta", text(address, "domicilioNumeroPuerta").into()),
            ("domicilioTipoInmueble_", text(address, "domicilioTipoInmueble").into()),
            ("domicilioLongitud", text(address, "domicilioLongitud").into()),
            ("domicilioLocalidad", raw(address, "domicilioLocalidad").into()),
            ("domicilioLocalidad_", text(address, "domicilioDistrito_").into()),
            ("domicilioDepartamento", 1.into()),
            ("domicilioBarrio", raw(address, "domicilioBarrio").into()),
            ("domicilioDistrito", raw(address, "domicilioLocalidad").into()),
        ])
    }

    fn verification_fields(&self, recovered: &Value, ctx: &HandlerContext) -> Option<Map<String, Value>> {
        let address = &recovered["domicilio"];
        Some(fields(vec![
            ("domicilioTelefono02Prefijo", "".into()),
            ("domicilioCelular02Prefijo", "".into()),
            ("domicilioCelular02", "".into()),
            ("domicilioTelefono02", "".into()),
            ("domicilioCelular02Sufijo", "".into()),
            ("domicilioTelefono02Sufijo", "".into()),
            ("domicilioFechaModificacion", ctx.today.format("%d/%m/%Y").to_string().into()),
            ("edicionDomicilio", "S".into()),
            ("domicilioLat", raw(address, "domicilioLatitud").into()),
            ("domicilioLng", raw(address, "domicilioLongitud").into()),
        ]))
    }

    fn success_message(&self) -> &'static str {
        "Tax payer info updated successfully!"
    }
}
